//! HTTP layer: HTTPS-first fetch with optional plaintext fallback.
//!
//! This is the ONLY place that interprets status codes. client/mod.rs and the
//! walker only see a body or an error.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use tracing::{debug, warn};
use url::Url;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::insecure::InsecureOptions;
use crate::transport::{FetchRequest, FetchResponse, Transport};
use crate::types::DiscoveryConfig;

use super::helpers::{discovery_url, parse_absolute, with_scheme};

/// A successful (2xx) fetch.
#[derive(Debug)]
pub(crate) struct Fetched {
    /// URL that produced the body (HTTPS or the HTTP fallback).
    pub url: Url,
    pub body: Vec<u8>,
}

/// HTTP backend for discovery requests (holds transport, config, headers).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: DiscoveryConfig,
    /// Host name -> headers attached to every request for that host.
    pub(crate) host_headers: HashMap<String, HeaderMap>,
}

impl HttpBackend {
    /// Fetch the discovery document for a namespace prefix.
    pub(crate) async fn fetch_discovery(
        &self,
        prefix: &str,
        insecure: InsecureOptions,
    ) -> DiscoveryResult<Fetched> {
        let https = discovery_url(prefix, "https", self.config.https_port)?;
        let http = if insecure.allow_http {
            Some(discovery_url(prefix, "http", self.config.http_port)?)
        } else {
            None
        };
        self.https_or_http(https, http, insecure).await
    }

    /// Fetch an absolute URL, forcing HTTPS first.
    pub(crate) async fn fetch_url(
        &self,
        raw: &str,
        insecure: InsecureOptions,
    ) -> DiscoveryResult<Fetched> {
        let url = parse_absolute(raw)?;
        let https = with_scheme(&url, "https")?;
        let http = if insecure.allow_http {
            Some(with_scheme(&url, "http")?)
        } else {
            None
        };
        self.https_or_http(https, http, insecure).await
    }

    async fn https_or_http(
        &self,
        https: Url,
        http: Option<Url>,
        insecure: InsecureOptions,
    ) -> DiscoveryResult<Fetched> {
        let first = self.attempt(&https, insecure.skip_tls_verify).await;

        let (url, result) = match (first, http) {
            (Ok(response), _) if response.is_success() => (https, Ok(response)),
            (first, Some(http)) => {
                match &first {
                    Ok(response) => warn!(
                        url = %https,
                        status = response.status,
                        "https discovery failed, falling back to http"
                    ),
                    Err(e) => warn!(
                        url = %https,
                        error = %e,
                        "https discovery failed, falling back to http"
                    ),
                }
                drop(first);
                let second = self.attempt(&http, false).await;
                (http, second)
            }
            (first, None) => (https, first),
        };

        let response = result?;
        if !response.is_success() {
            return Err(DiscoveryError::DiscoveryFetchFailed {
                url: url.to_string(),
                status: response.status,
            });
        }

        debug!(url = %url, bytes = response.body.len(), "fetched discovery document");
        Ok(Fetched {
            url,
            body: response.body,
        })
    }

    async fn attempt(&self, url: &Url, skip_tls_verify: bool) -> DiscoveryResult<FetchResponse> {
        let headers = url.host_str().and_then(|host| self.host_headers.get(host));
        debug!(url = %url, skip_tls_verify, "discovery request");

        self.transport
            .get(FetchRequest {
                url,
                headers,
                skip_tls_verify: skip_tls_verify && url.scheme() == "https",
            })
            .await
    }
}
