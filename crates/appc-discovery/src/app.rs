//! App identifiers and labels.
//!
//! Supports the command-line shorthand:
//! - `example.com/reduce-worker` → name only
//! - `example.com/reduce-worker:1.0.0` → name + version label
//! - `example.com/reduce-worker,channel=alpha,label=value` → name + labels
//! - `example.com/reduce-worker:1.0.0,label=value` → both
//!
//! `:`, `,` and `=` are syntax. Label values containing them must be
//! percent-encoded; [`App`]'s `Display` output does this, so it always parses
//! back to an equal app.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};

/// Label key that is reserved for the app name in templates.
pub const RESERVED_LABEL: &str = "name";

/// Characters escaped in label values of the canonical string form.
const LABEL_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b',')
    .add(b'=')
    .add(b':');

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+([-./][a-z0-9]+)*$").expect("name pattern is a valid regex")
    })
}

fn validate_name(name: &str) -> DiscoveryResult<()> {
    if name.is_empty() {
        return Err(DiscoveryError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if !name_pattern().is_match(name) {
        return Err(DiscoveryError::InvalidName {
            name: name.to_string(),
            reason: "must contain lower case alphanumeric characters plus \".\", \"-\", \"/\""
                .to_string(),
        });
    }
    Ok(())
}

/// A validated, slash-delimited app name such as `example.com/myapp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    pub fn new(name: impl Into<String>) -> DiscoveryResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/`-separated segments of the name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Namespace prefixes from most to least specific.
    ///
    /// `example.com/myapp/foobar` yields `example.com/myapp/foobar`,
    /// `example.com/myapp`, `example.com`.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes = vec![self.0.as_str()];
        let mut rest = self.0.as_str();
        while let Some(pos) = rest.rfind('/') {
            rest = &rest[..pos];
            prefixes.push(rest);
        }
        prefixes
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AppName {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AppName> for String {
    fn from(name: AppName) -> Self {
        name.0
    }
}

/// App labels. Keys are unique and follow the name grammar; `name` is
/// reserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "BTreeMap<String, String>")]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label that is not present yet.
    ///
    /// Duplicate and reserved keys are errors, never silent overwrites.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> DiscoveryResult<()> {
        let key = key.into();
        if key == RESERVED_LABEL {
            return Err(DiscoveryError::InvalidName {
                name: key,
                reason: "label name is reserved".to_string(),
            });
        }
        validate_name(&key)?;
        if self.0.contains_key(&key) {
            return Err(DiscoveryError::InvalidName {
                name: key,
                reason: "duplicate label".to_string(),
            });
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    /// Add a label only when the key is absent. Returns whether it was added.
    pub(crate) fn insert_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.0.contains_key(key) {
            return false;
        }
        self.0.insert(key.to_string(), value.to_string());
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl TryFrom<BTreeMap<String, String>> for Labels {
    type Error = DiscoveryError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut labels = Labels::new();
        for (key, value) in map {
            labels.insert(key, value)?;
        }
        Ok(labels)
    }
}

// Entries go through `insert` one by one so a repeated key in the input is
// rejected instead of overwriting the earlier value.
impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelsVisitor;

        impl<'de> Visitor<'de> for LabelsVisitor {
            type Value = Labels;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of label names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Labels, A::Error> {
                let mut labels = Labels::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    labels.insert(key, value).map_err(de::Error::custom)?;
                }
                Ok(labels)
            }
        }

        deserializer.deserialize_map(LabelsVisitor)
    }
}

impl<'a, const N: usize> TryFrom<[(&'a str, &'a str); N]> for Labels {
    type Error = DiscoveryError;

    fn try_from(pairs: [(&'a str, &'a str); N]) -> Result<Self, Self::Error> {
        let mut labels = Labels::new();
        for (key, value) in pairs {
            labels.insert(key, value)?;
        }
        Ok(labels)
    }
}

impl From<Labels> for BTreeMap<String, String> {
    fn from(labels: Labels) -> Self {
        labels.0
    }
}

/// An app to discover: name, labels and an optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: AppName,

    #[serde(default)]
    pub labels: Labels,

    /// Movable tag resolved through the image tags document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl App {
    pub fn new(name: &str, labels: Labels) -> DiscoveryResult<Self> {
        Ok(Self {
            name: AppName::new(name)?,
            labels,
            tag: None,
        })
    }

    /// Parse an app string.
    ///
    /// # Examples
    ///
    /// ```
    /// use appc_discovery::App;
    ///
    /// let app = App::parse("example.com/reduce-worker:1.0.0,channel=alpha").unwrap();
    /// assert_eq!(app.name.as_str(), "example.com/reduce-worker");
    /// assert_eq!(app.labels.version(), Some("1.0.0"));
    /// assert_eq!(app.labels.get("channel"), Some("alpha"));
    ///
    /// // Labels without a value are rejected
    /// assert!(App::parse("example.com/reduce-worker,channel").is_err());
    /// ```
    pub fn parse(input: &str) -> DiscoveryResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DiscoveryError::malformed(input, "empty app string"));
        }

        let expanded = trimmed.replace(':', ",version=");
        let mut parts = expanded.split(',');
        let name = parts.next().unwrap_or_default();
        let name = AppName::new(name).map_err(|e| DiscoveryError::malformed(input, e.to_string()))?;

        let mut labels = Labels::new();
        for part in parts {
            let (key, raw) = part.split_once('=').ok_or_else(|| {
                DiscoveryError::malformed(input, format!("label {:?} has no value", part))
            })?;
            check_escapes(raw).map_err(|reason| {
                DiscoveryError::malformed(
                    input,
                    format!("value of label {:?} cannot be percent-decoded: {}", key, reason),
                )
            })?;
            let value = percent_decode_str(raw).decode_utf8().map_err(|e| {
                DiscoveryError::malformed(
                    input,
                    format!("value of label {:?} cannot be percent-decoded: {}", key, e),
                )
            })?;
            labels
                .insert(key, value)
                .map_err(|e| DiscoveryError::malformed(input, e.to_string()))?;
        }

        Ok(Self {
            name,
            labels,
            tag: None,
        })
    }

    /// Set the tag. An empty tag means no tag.
    ///
    /// The tag is not part of the string form: `Display` writes only the name
    /// and labels, so a parsed copy of a tagged app has no tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = if tag.is_empty() { None } else { Some(tag) };
        self
    }

    /// Add a label, failing on reserved or duplicate keys.
    pub fn with_label(mut self, key: &str, value: &str) -> DiscoveryResult<Self> {
        self.labels.insert(key, value)?;
        Ok(self)
    }

    /// Fill missing `os` and `arch` labels from the running host.
    pub fn with_default_platform(mut self) -> Self {
        self.labels.insert_if_absent("os", host_os());
        self.labels.insert_if_absent("arch", host_arch());
        self
    }
}

/// Canonical `name,key=value,...` form. Labels are written in key order with
/// escaped values; the tag is not included.
impl std::fmt::Display for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in self.labels.iter() {
            write!(f, ",{}={}", key, utf8_percent_encode(value, LABEL_VALUE))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for App {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Every `%` must start a `%XX` escape with two hex digits.
fn check_escapes(raw: &str) -> Result<(), String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => {
                    let end = (i + 3).min(bytes.len());
                    return Err(format!(
                        "invalid escape {:?}",
                        String::from_utf8_lossy(&bytes[i..end])
                    ));
                }
            }
        } else {
            i += 1;
        }
    }
    Ok(())
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "powerpc64" => "ppc64",
        other => other,
    }
}
