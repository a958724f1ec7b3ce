//! HTTP transport used by discovery.
//!
//! The client never talks to reqwest directly: every GET goes through a
//! [`Transport`] so tests can substitute an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::error::{DiscoveryError, DiscoveryResult};

pub const USER_AGENT_VALUE: &str = concat!("appc-discovery/", env!("CARGO_PKG_VERSION"));

/// A single GET request.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a Url,

    /// Caller-supplied headers for the target host.
    pub headers: Option<&'a HeaderMap>,

    /// Skip certificate validation for this request only.
    pub skip_tls_verify: bool,
}

/// Response to a [`FetchRequest`].
///
/// `body` is only read for 2xx responses; other responses are released
/// without reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs discovery GETs.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Issue one GET. Connection and TLS failures are errors; any HTTP
    /// status is a response.
    async fn get(&self, request: FetchRequest<'_>) -> DiscoveryResult<FetchResponse>;
}

/// reqwest-backed transport.
///
/// Holds a verifying client and a non-verifying one; the latter is only used
/// for requests that ask for it.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> DiscoveryResult<Self> {
        Ok(Self {
            client: build_client(connect_timeout, false)?,
            insecure_client: build_client(connect_timeout, true)?,
        })
    }
}

fn build_client(connect_timeout: Duration, skip_tls_verify: bool) -> DiscoveryResult<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .default_headers(default_headers)
        .danger_accept_invalid_certs(skip_tls_verify)
        .build()
        .map_err(|e| DiscoveryError::Config {
            message: format!("failed to create HTTP client: {}", e),
        })
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: FetchRequest<'_>) -> DiscoveryResult<FetchResponse> {
        let client = if request.skip_tls_verify {
            &self.insecure_client
        } else {
            &self.client
        };

        let mut builder = client.get(request.url.clone());
        if let Some(headers) = request.headers {
            builder = builder.headers(headers.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // Non-2xx bodies are dropped unread, which releases the connection.
        if !response.status().is_success() {
            return Ok(FetchResponse {
                status,
                body: Vec::new(),
            });
        }

        let body = response.bytes().await.map_err(|e| DiscoveryError::Network {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}
