//! Discovery client.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs,
//! all namespace walking in walk.rs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::{debug, info};

use crate::app::App;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::insecure::InsecureOptions;
use crate::tags::{merge_tag, ImageTags};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    AciEndpoint, Discovered, DiscoveryConfig, DiscoveryReport, FailedAttempt, TagEndpoint,
};
use crate::walk::{self, AciEndpoints, PublicKeys, TagEndpoints};

mod helpers;
pub(crate) mod http;

use http::HttpBackend;

/// Client for app container discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: HttpBackend,
}

impl DiscoveryClient {
    /// Create a client backed by reqwest.
    pub fn new(config: DiscoveryConfig) -> DiscoveryResult<Self> {
        let transport =
            ReqwestTransport::new(Duration::from_secs(config.connect_timeout_secs))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(config: DiscoveryConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            http: HttpBackend {
                transport,
                config,
                host_headers: HashMap::new(),
            },
        }
    }

    pub fn from_env() -> DiscoveryResult<Self> {
        Self::new(DiscoveryConfig::from_env())
    }

    /// Attach headers (e.g. authentication) to every request for `host`.
    pub fn with_host_headers(mut self, host: impl Into<String>, headers: HeaderMap) -> Self {
        self.http.host_headers.insert(host.into(), headers);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.http.config
    }

    fn insecure(&self) -> InsecureOptions {
        self.http.config.insecure
    }

    /// Walk for `ac-discovery` image endpoints.
    pub async fn discover_aci_endpoints(
        &self,
        app: &App,
    ) -> DiscoveryResult<Discovered<AciEndpoint>> {
        walk::walk::<AciEndpoints>(&self.http, app, self.insecure()).await
    }

    /// Walk for `ac-discovery-pubkeys` key URLs.
    pub async fn discover_public_keys(&self, app: &App) -> DiscoveryResult<Discovered<String>> {
        walk::walk::<PublicKeys>(&self.http, app, self.insecure()).await
    }

    /// Walk for `ac-discovery-tags` tags document endpoints.
    pub async fn discover_tag_endpoints(
        &self,
        app: &App,
    ) -> DiscoveryResult<Discovered<TagEndpoint>> {
        walk::walk::<TagEndpoints>(&self.http, app, self.insecure()).await
    }

    /// Fetch and decode the tags document behind a tag endpoint.
    pub async fn fetch_image_tags(&self, endpoint: &TagEndpoint) -> DiscoveryResult<ImageTags> {
        debug!(url = %endpoint.image_tags, "fetching image tags");
        let fetched = self
            .http
            .fetch_url(&endpoint.image_tags, self.insecure())
            .await?;
        ImageTags::from_json(&fetched.body)
    }

    /// Merge the app's tag into its labels.
    ///
    /// Uses the first discovered tags document; without one the tag becomes
    /// the `version` label. Returns the updated app and the attempts made
    /// while looking for tag endpoints.
    pub async fn resolve_tag(&self, app: &App) -> DiscoveryResult<(App, Vec<FailedAttempt>)> {
        let tag = match app.tag.as_deref() {
            Some(tag) if !tag.is_empty() => tag,
            _ => return Ok((app.clone(), Vec::new())),
        };

        let (tags, attempts) = match self.discover_tag_endpoints(app).await {
            Ok(discovered) => {
                let endpoint = discovered.found.first().ok_or_else(|| {
                    DiscoveryError::InvalidResponse {
                        message: "tag walk succeeded without endpoints".to_string(),
                    }
                })?;
                (Some(self.fetch_image_tags(endpoint).await?), discovered.attempts)
            }
            Err(DiscoveryError::NothingDiscovered { attempts, .. }) => {
                debug!(tag, "no tag endpoints, using tag as version");
                (None, attempts)
            }
            Err(e) => return Err(e),
        };

        let labels = merge_tag(&app.labels, tags.as_ref(), tag)?;
        let resolved = App {
            labels,
            ..app.clone()
        };
        Ok((resolved, attempts))
    }

    /// Resolve tag, image endpoints and public keys for an app.
    ///
    /// Finding no image endpoints is an error; finding no public keys is not.
    pub async fn discover(&self, app: &App) -> DiscoveryResult<DiscoveryReport> {
        let (app, tag_attempts) = self.resolve_tag(app).await?;

        let aci_endpoints = self.discover_aci_endpoints(&app).await?;

        let public_keys = match self.discover_public_keys(&app).await {
            Ok(keys) => keys,
            Err(DiscoveryError::NothingDiscovered { attempts, .. }) => {
                debug!(app = %app, "no public keys published");
                Discovered::empty(attempts)
            }
            Err(e) => return Err(e),
        };

        info!(
            app = %app,
            endpoints = aci_endpoints.found.len(),
            keys = public_keys.found.len(),
            "discovery complete"
        );

        Ok(DiscoveryReport {
            app,
            aci_endpoints,
            public_keys,
            tag_attempts,
        })
    }
}
