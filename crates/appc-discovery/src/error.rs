//! Error types for discovery.

use crate::types::{DiscoveryClass, FailedAttempt};

/// Discovery errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// App string could not be parsed into a name and labels.
    #[error("malformed app identifier {input:?}: {reason}")]
    MalformedIdentifier { input: String, reason: String },

    /// Name or label key does not match the name grammar.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A discovery URL could not be built from a prefix or template.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Every attempt for a URL finished without a 2xx response.
    #[error("discovery fetch failed for {url}: expected a 2xx response, got {status}")]
    DiscoveryFetchFailed { url: String, status: u16 },

    /// Transport-level failure (connect, TLS, read).
    #[error("network error: {message}")]
    Network { message: String },

    /// A fetched document had no usable declaration for the class.
    #[error("no usable {class} declarations")]
    NoDeclarations { class: DiscoveryClass },

    /// No namespace level produced a result for the class.
    #[error("no {class} discovered ({} failed attempts)", .attempts.len())]
    NothingDiscovered {
        class: DiscoveryClass,
        attempts: Vec<FailedAttempt>,
    },

    /// Following tag aliases revisited a tag.
    #[error("circular dependency between tag aliases at {tag:?}")]
    CircularTagAlias { tag: String },

    /// Tag cannot become the version label because one is already set.
    #[error("cannot set tag {tag:?} as version label: version is already {version:?}")]
    VersionLabelConflict { tag: String, version: String },

    /// A fetched document could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DiscoveryError {
    /// Exit code for command-line callers.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Input issues
            Self::MalformedIdentifier { .. } => 1,
            Self::InvalidName { .. } => 1,
            Self::Config { .. } => 1,

            // Tag resolution
            Self::CircularTagAlias { .. } => 2,
            Self::VersionLabelConflict { .. } => 2,

            // Nothing found
            Self::NothingDiscovered { .. } => 3,
            Self::NoDeclarations { .. } => 3,

            // Network/transient
            Self::DiscoveryFetchFailed { .. } => 5,
            Self::Network { .. } => 5,
            Self::InvalidUrl { .. } => 5,

            Self::InvalidResponse { .. } => 6,
        }
    }

    /// Whether the error aborts a whole resolution.
    ///
    /// Per-prefix fetch errors are not fatal: the walk records them and
    /// moves on to the next prefix.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DiscoveryFetchFailed { .. }
                | Self::Network { .. }
                | Self::InvalidUrl { .. }
                | Self::NoDeclarations { .. }
        )
    }

    /// Attempt log carried by a `NothingDiscovered` error.
    pub fn attempts(&self) -> &[FailedAttempt] {
        match self {
            Self::NothingDiscovered { attempts, .. } => attempts,
            _ => &[],
        }
    }

    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
