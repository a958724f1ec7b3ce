//! Result and configuration types for the discovery protocol.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::app::App;
use crate::error::DiscoveryError;
use crate::insecure::InsecureOptions;

/// Information class a walk is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryClass {
    /// `ac-discovery`: image and signature URLs.
    AciEndpoints,

    /// `ac-discovery-pubkeys`: public key URLs.
    PublicKeys,

    /// `ac-discovery-tags`: image tags document URLs.
    TagEndpoints,
}

impl DiscoveryClass {
    /// Meta tag name that carries this class.
    pub fn meta_name(&self) -> &'static str {
        match self {
            Self::AciEndpoints => "ac-discovery",
            Self::PublicKeys => "ac-discovery-pubkeys",
            Self::TagEndpoints => "ac-discovery-tags",
        }
    }
}

impl std::fmt::Display for DiscoveryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AciEndpoints => write!(f, "ACI endpoints"),
            Self::PublicKeys => write!(f, "public keys"),
            Self::TagEndpoints => write!(f, "tag endpoints"),
        }
    }
}

/// A discovered image location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AciEndpoint {
    /// Image URL (`{ext}` rendered to `aci`).
    #[serde(rename = "ACI")]
    pub aci: String,

    /// Detached signature URL (`{ext}` rendered to `aci.asc`).
    #[serde(rename = "ASC")]
    pub asc: String,
}

/// A discovered image tags document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEndpoint {
    /// Tags document URL.
    #[serde(rename = "ImageTags")]
    pub image_tags: String,

    /// Detached signature URL for the tags document.
    #[serde(rename = "ASC")]
    pub asc: String,
}

/// A namespace level that did not satisfy a walk.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    /// Namespace prefix that was fetched.
    pub prefix: String,

    /// Why the level produced nothing.
    pub error: DiscoveryError,
}

impl std::fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "prefix: {} error: {}", self.prefix, self.error)
    }
}

impl Serialize for FailedAttempt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FailedAttempt", 2)?;
        state.serialize_field("prefix", &self.prefix)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// Outcome of one walk: what was found and where the walk failed on the way.
#[derive(Debug, Clone, Serialize)]
pub struct Discovered<T> {
    /// Results from the satisfying level, in document order.
    pub found: Vec<T>,

    /// Prefix that satisfied the walk (`None` if nothing was found).
    pub prefix: Option<String>,

    /// Levels visited before the satisfying one.
    pub attempts: Vec<FailedAttempt>,
}

impl<T> Discovered<T> {
    /// An empty outcome that keeps the attempt log.
    pub fn empty(attempts: Vec<FailedAttempt>) -> Self {
        Self {
            found: Vec::new(),
            prefix: None,
            attempts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Full discovery outcome for one app.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    /// The app after tag labels were merged in.
    pub app: App,

    /// Image endpoints.
    pub aci_endpoints: Discovered<AciEndpoint>,

    /// Public keys (may be empty: publishing keys is optional).
    pub public_keys: Discovered<String>,

    /// Attempts made while looking for tag endpoints.
    pub tag_attempts: Vec<FailedAttempt>,
}

/// Discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Which insecure behaviors are permitted.
    #[serde(default)]
    pub insecure: InsecureOptions,

    /// Connection establishment timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Port for HTTPS discovery requests (scheme default if unset).
    #[serde(default)]
    pub https_port: Option<u16>,

    /// Port for plaintext discovery requests (scheme default if unset).
    #[serde(default)]
    pub http_port: Option<u16>,
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            insecure: InsecureOptions::NONE,
            connect_timeout_secs: default_connect_timeout(),
            https_port: None,
            http_port: None,
        }
    }
}

impl DiscoveryConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AC_DISCOVERY_INSECURE` | `none`, `tls`, `http` or `all` |
    /// | `AC_DISCOVERY_CONNECT_TIMEOUT` | Connect timeout in seconds |
    /// | `AC_DISCOVERY_HTTPS_PORT` | Port for HTTPS attempts |
    /// | `AC_DISCOVERY_HTTP_PORT` | Port for HTTP attempts |
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            insecure: std::env::var("AC_DISCOVERY_INSECURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            connect_timeout_secs: std::env::var("AC_DISCOVERY_CONNECT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_connect_timeout),
            https_port: std::env::var("AC_DISCOVERY_HTTPS_PORT")
                .ok()
                .and_then(|v| v.parse().ok()),
            http_port: std::env::var("AC_DISCOVERY_HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Set the insecure options.
    pub fn with_insecure(mut self, insecure: InsecureOptions) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Override the ports used for discovery requests.
    pub fn with_ports(mut self, https_port: Option<u16>, http_port: Option<u16>) -> Self {
        self.https_port = https_port;
        self.http_port = http_port;
        self
    }
}
