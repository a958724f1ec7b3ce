//! Transport security policy for discovery fetches.
//!
//! HTTPS is always attempted first. The options only widen what happens
//! during and after that attempt.

use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Insecure behaviors permitted for one resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsecureOptions {
    /// Skip certificate validation on HTTPS attempts.
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Fall back to plaintext HTTP when HTTPS does not succeed.
    #[serde(default)]
    pub allow_http: bool,
}

impl InsecureOptions {
    /// Fully secure: verified HTTPS only.
    pub const NONE: Self = Self {
        skip_tls_verify: false,
        allow_http: false,
    };

    /// Skip certificate validation.
    pub const TLS: Self = Self {
        skip_tls_verify: true,
        allow_http: false,
    };

    /// Allow plaintext fallback.
    pub const HTTP: Self = Self {
        skip_tls_verify: false,
        allow_http: true,
    };

    /// Both.
    pub const ALL: Self = Self {
        skip_tls_verify: true,
        allow_http: true,
    };

    pub fn is_secure(&self) -> bool {
        *self == Self::NONE
    }
}

impl BitOr for InsecureOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            skip_tls_verify: self.skip_tls_verify || rhs.skip_tls_verify,
            allow_http: self.allow_http || rhs.allow_http,
        }
    }
}

impl FromStr for InsecureOptions {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "0" | "false" => Ok(Self::NONE),
            "tls" => Ok(Self::TLS),
            "http" => Ok(Self::HTTP),
            "all" | "1" | "true" => Ok(Self::ALL),
            other => Err(DiscoveryError::Config {
                message: format!(
                    "unknown insecure option {:?} (expected none, tls, http or all)",
                    other
                ),
            }),
        }
    }
}

impl std::fmt::Display for InsecureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match (self.skip_tls_verify, self.allow_http) {
            (false, false) => "none",
            (true, false) => "tls",
            (false, true) => "http",
            (true, true) => "all",
        };
        f.write_str(s)
    }
}
