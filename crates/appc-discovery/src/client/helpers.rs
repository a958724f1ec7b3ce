//! Pure helpers: discovery URL building (no HTTP, no status logic).

use url::Url;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Query marking a request as a discovery request.
pub(crate) const DISCOVERY_QUERY: &str = "ac-discovery=1";

/// Build `<scheme>://<prefix>?ac-discovery=1`, with an optional port.
pub(crate) fn discovery_url(prefix: &str, scheme: &str, port: Option<u16>) -> DiscoveryResult<Url> {
    let raw = format!("{}://{}", scheme, prefix);
    let mut url = Url::parse(&raw).map_err(|e| DiscoveryError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    url.set_query(Some(DISCOVERY_QUERY));
    if port.is_some() {
        url.set_port(port).map_err(|_| DiscoveryError::InvalidUrl {
            url: raw,
            reason: "cannot set port".to_string(),
        })?;
    }
    Ok(url)
}

/// Same URL with a different scheme.
pub(crate) fn with_scheme(url: &Url, scheme: &str) -> DiscoveryResult<Url> {
    let mut out = url.clone();
    out.set_scheme(scheme).map_err(|_| DiscoveryError::InvalidUrl {
        url: url.to_string(),
        reason: format!("cannot switch scheme to {}", scheme),
    })?;
    Ok(out)
}

/// Parse an absolute URL produced by a template.
pub(crate) fn parse_absolute(raw: &str) -> DiscoveryResult<Url> {
    Url::parse(raw).map_err(|e| DiscoveryError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
