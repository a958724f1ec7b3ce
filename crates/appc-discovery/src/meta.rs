//! `<meta>` discovery declaration extraction.
//!
//! A discovery document declares templates as
//! `<meta name="ac-discovery" content="<prefix> <uri-template>">`.

use scraper::{Html, Selector};
use tracing::debug;

/// Reserved name prefix for discovery meta tags.
pub const AC_META_PREFIX: &str = "ac-";

/// One discovery declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcMeta {
    /// Meta tag name, e.g. `ac-discovery`.
    pub name: String,

    /// Identifier prefix the declaration applies to.
    pub prefix: String,

    /// URI template.
    pub uri: String,
}

impl AcMeta {
    /// Whether the declaration applies to the given app name.
    pub fn applies_to(&self, app_name: &str) -> bool {
        app_name.starts_with(&self.prefix)
    }

    fn from_attrs(name: Option<&str>, content: Option<&str>) -> Option<Self> {
        let name = name.unwrap_or_default();
        let (prefix, uri) = content?.trim().split_once(' ')?;
        let uri = uri.trim();

        if !name.starts_with(AC_META_PREFIX) || prefix.is_empty() || uri.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        })
    }
}

/// Extract discovery declarations in document order.
///
/// Never fails: malformed markup yields whatever declarations could be read.
pub fn extract_meta(body: &[u8]) -> Vec<AcMeta> {
    let Ok(selector) = Selector::parse("meta") else {
        return Vec::new();
    };

    let text = String::from_utf8_lossy(body);
    let document = Html::parse_document(&text);

    let metas: Vec<AcMeta> = document
        .select(&selector)
        .filter_map(|element| {
            let el = element.value();
            AcMeta::from_attrs(el.attr("name"), el.attr("content"))
        })
        .collect();

    debug!(count = metas.len(), "extracted discovery meta tags");
    metas
}
