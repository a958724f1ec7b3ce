//! Image tags: movable tags resolved to labels through an alias graph.
//!
//! The tags document is JSON:
//!
//! ```json
//! {
//!   "aliases": { "latest": "2.x" },
//!   "labels": { "2.x": { "version": "2.0.0" } }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Labels;
use crate::error::{DiscoveryError, DiscoveryResult};

/// Alias graph and terminal tag labels. Read-only during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTags {
    /// Tag -> tag.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Terminal tag -> labels.
    #[serde(default)]
    pub labels: BTreeMap<String, Labels>,
}

impl ImageTags {
    /// Decode a tags document.
    pub fn from_json(body: &[u8]) -> DiscoveryResult<Self> {
        serde_json::from_slice(body).map_err(|e| DiscoveryError::InvalidResponse {
            message: format!("failed to parse image tags: {}", e),
        })
    }

    /// Follow aliases from `tag` and return the labels of the terminal tag.
    ///
    /// `Ok(None)` means the tag is known to have no labels. Revisiting a tag
    /// while following aliases is a `CircularTagAlias` error.
    pub fn resolve(&self, tag: &str) -> DiscoveryResult<Option<&Labels>> {
        let mut current = tag;
        let mut seen = HashSet::new();
        seen.insert(current);

        while let Some(alias) = self.aliases.get(current) {
            if !seen.insert(alias.as_str()) {
                return Err(DiscoveryError::CircularTagAlias {
                    tag: alias.clone(),
                });
            }
            current = alias.as_str();
        }

        debug!(tag, resolved = current, "resolved tag alias");
        Ok(self.labels.get(current))
    }
}

/// Merge the labels a tag resolves to into explicit labels.
///
/// Explicit labels always win. Without tag data the tag itself becomes the
/// `version` label, which conflicts with an explicit `version`.
pub fn merge_tag(
    labels: &Labels,
    tags: Option<&ImageTags>,
    tag: &str,
) -> DiscoveryResult<Labels> {
    if tag.is_empty() {
        return Ok(labels.clone());
    }

    let mut merged = labels.clone();

    let Some(tags) = tags else {
        if let Some(version) = labels.version() {
            return Err(DiscoveryError::VersionLabelConflict {
                tag: tag.to_string(),
                version: version.to_string(),
            });
        }
        merged.insert_if_absent("version", tag);
        return Ok(merged);
    };

    if let Some(tag_labels) = tags.resolve(tag)? {
        for (key, value) in tag_labels.iter() {
            merged.insert_if_absent(key, value);
        }
    }

    Ok(merged)
}
