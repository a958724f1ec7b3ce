//! App container image discovery.
//!
//! Maps a human-readable image name plus labels to the URLs of the image,
//! its detached signature and the publisher's public keys, using
//! `<meta name="ac-discovery" ...>` declarations served over HTTPS.
//!
//! - Name and label parsing (`example.com/app:1.0,os=linux`)
//! - Meta-tag extraction from HTML discovery documents
//! - URL templates with `{name}`, `{ext}` and label variables
//! - Namespace walk from the most specific prefix up to the host
//! - Tag resolution through published alias graphs
//! - Optional HTTP fallback and TLS verification bypass
//!
//! # Quick Start
//!
//! ```no_run
//! use appc_discovery::{App, DiscoveryClient, DiscoveryConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DiscoveryClient::new(DiscoveryConfig::default())?;
//!
//! let app = App::parse("example.com/reduce-worker:1.0.0")?.with_default_platform();
//! let report = client.discover(&app).await?;
//! for endpoint in &report.aci_endpoints.found {
//!     println!("{} (signature: {})", endpoint.aci, endpoint.asc);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AC_DISCOVERY_INSECURE` | `none` (default), `tls`, `http` or `all` |
//! | `AC_DISCOVERY_CONNECT_TIMEOUT` | Connect timeout in seconds (default: 5) |
//! | `AC_DISCOVERY_HTTPS_PORT` | Port for HTTPS discovery requests |
//! | `AC_DISCOVERY_HTTP_PORT` | Port for HTTP discovery requests |

pub mod app;
pub mod client;
pub mod error;
pub mod insecure;
pub mod meta;
pub mod tags;
pub mod template;
pub mod transport;
pub mod types;
mod walk;

// Re-export main types
pub use app::{App, AppName, Labels, RESERVED_LABEL};
pub use client::DiscoveryClient;
pub use error::{DiscoveryError, DiscoveryResult};
pub use insecure::InsecureOptions;
pub use meta::{extract_meta, AcMeta, AC_META_PREFIX};
pub use tags::{merge_tag, ImageTags};
pub use template::{render, EXT_ACI, EXT_ASC};
pub use transport::{FetchRequest, FetchResponse, ReqwestTransport, Transport, USER_AGENT_VALUE};
pub use types::{
    AciEndpoint, Discovered, DiscoveryClass, DiscoveryConfig, DiscoveryReport, FailedAttempt,
    TagEndpoint,
};
