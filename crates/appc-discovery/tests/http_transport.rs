//! Integration tests for DiscoveryClient over real HTTP.
//!
//! Uses wiremock for HTTP mocking. The mock server only speaks plaintext, so
//! every HTTPS attempt fails at the TLS handshake and these tests exercise
//! the HTTP fallback path.

use std::time::{Duration, Instant};

use appc_discovery::{
    App, DiscoveryClient, DiscoveryConfig, DiscoveryError, InsecureOptions, Labels,
    USER_AGENT_VALUE,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client(mock_server: &MockServer, insecure: InsecureOptions) -> DiscoveryClient {
    let port = mock_server.address().port();
    let config = DiscoveryConfig::default()
        .with_insecure(insecure)
        .with_connect_timeout(2)
        .with_ports(Some(port), Some(port));
    DiscoveryClient::new(config).expect("failed to create client")
}

fn discovery_page(metas: &[(&str, &str, String)]) -> String {
    let tags: String = metas
        .iter()
        .map(|(name, prefix, uri)| {
            format!(r#"<meta name="{}" content="{} {}">"#, name, prefix, uri)
        })
        .collect();
    format!(
        "<!DOCTYPE html><html><head><title>myapp</title>{}</head><body>myapp</body></html>",
        tags
    )
}

fn test_app() -> App {
    let labels = Labels::try_from([("os", "linux"), ("arch", "amd64"), ("version", "1.0.0")])
        .expect("valid labels");
    App::new("127.0.0.1/myapp", labels).expect("valid app")
}

#[tokio::test]
async fn test_discover_over_http_fallback() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .and(query_param("ac-discovery", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[
            (
                "ac-discovery",
                "127.0.0.1/myapp",
                format!("{}/{{name}}-{{version}}-{{os}}-{{arch}}.{{ext}}", base),
            ),
            (
                "ac-discovery-pubkeys",
                "127.0.0.1",
                format!("{}/pubkeys.gpg", base),
            ),
        ])))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, InsecureOptions::HTTP);
    let report = client.discover(&test_app()).await.expect("discovery failed");

    assert_eq!(
        report.aci_endpoints.found[0].aci,
        format!("{}/127.0.0.1/myapp-1.0.0-linux-amd64.aci", base)
    );
    assert_eq!(
        report.aci_endpoints.found[0].asc,
        format!("{}/127.0.0.1/myapp-1.0.0-linux-amd64.aci.asc", base)
    );
    assert!(report.aci_endpoints.attempts.is_empty());
    assert_eq!(report.public_keys.found, vec![format!("{}/pubkeys.gpg", base)]);
}

#[tokio::test]
async fn test_https_only_fails_without_http_permission() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[(
            "ac-discovery",
            "127.0.0.1/myapp",
            "https://example.com/{name}.{ext}".to_string(),
        )])))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, InsecureOptions::TLS);
    let err = client
        .discover_aci_endpoints(&test_app())
        .await
        .unwrap_err();

    assert_eq!(err.attempts().len(), 2);
    for attempt in err.attempts() {
        assert!(
            matches!(attempt.error, DiscoveryError::Network { .. }),
            "unexpected error: {}",
            attempt.error
        );
    }
}

#[tokio::test]
async fn test_walk_moves_up_on_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("ac-discovery", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[(
            "ac-discovery",
            "127.0.0.1",
            "https://storage.example.com/{name}.{ext}".to_string(),
        )])))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, InsecureOptions::HTTP);
    let discovered = client
        .discover_aci_endpoints(&test_app())
        .await
        .expect("discovery failed");

    assert_eq!(discovered.prefix.as_deref(), Some("127.0.0.1"));
    assert_eq!(
        discovered.found[0].aci,
        "https://storage.example.com/127.0.0.1/myapp.aci"
    );
    assert_eq!(discovered.attempts.len(), 1);
    assert!(matches!(
        discovered.attempts[0].error,
        DiscoveryError::DiscoveryFetchFailed { status: 404, .. }
    ));
}

#[tokio::test]
async fn test_user_agent_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .and(header("user-agent", USER_AGENT_VALUE))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[(
            "ac-discovery",
            "127.0.0.1/myapp",
            "https://example.com/{name}.{ext}".to_string(),
        )])))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, InsecureOptions::HTTP);
    let discovered = client
        .discover_aci_endpoints(&test_app())
        .await
        .expect("discovery failed");

    assert_eq!(discovered.found.len(), 1);
}

#[tokio::test]
async fn test_host_headers_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[(
            "ac-discovery",
            "127.0.0.1/myapp",
            "https://example.com/{name}.{ext}".to_string(),
        )])))
        .mount(&mock_server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer test-token"));

    let client =
        create_test_client(&mock_server, InsecureOptions::HTTP).with_host_headers("127.0.0.1", headers);
    let discovered = client
        .discover_aci_endpoints(&test_app())
        .await
        .expect("discovery failed");

    assert_eq!(discovered.found.len(), 1);
}

#[tokio::test]
async fn test_discover_with_tags_document() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .and(query_param("ac-discovery", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[
            (
                "ac-discovery-tags",
                "127.0.0.1/myapp",
                format!("{}/tags.{{ext}}", base),
            ),
            (
                "ac-discovery",
                "127.0.0.1/myapp",
                format!("{}/{{name}}-{{version}}.{{ext}}", base),
            ),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tags.aci"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "aliases": {"latest": "3.x"},
            "labels": {"3.x": {"version": "3.1.0"}}
        })))
        .mount(&mock_server)
        .await;

    let app = App::new("127.0.0.1/myapp", Labels::new())
        .expect("valid app")
        .with_tag("latest");

    let client = create_test_client(&mock_server, InsecureOptions::HTTP);
    let report = client.discover(&app).await.expect("discovery failed");

    assert_eq!(report.app.labels.version(), Some("3.1.0"));
    assert_eq!(
        report.aci_endpoints.found[0].aci,
        format!("{}/127.0.0.1/myapp-3.1.0.aci", base)
    );
}

#[tokio::test]
async fn test_malformed_tags_document_is_fatal() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/myapp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(discovery_page(&[(
            "ac-discovery-tags",
            "127.0.0.1/myapp",
            format!("{}/tags.{{ext}}", base),
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tags.aci"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let app = App::new("127.0.0.1/myapp", Labels::new())
        .expect("valid app")
        .with_tag("latest");

    let client = create_test_client(&mock_server, InsecureOptions::HTTP);
    let err = client.discover(&app).await.unwrap_err();

    assert!(matches!(err, DiscoveryError::InvalidResponse { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_connect_timeout_bounds_unreachable_host() -> anyhow::Result<()> {
    // 10.255.255.1 is a non-routable address: connects hang until the timeout.
    let config = DiscoveryConfig::default().with_connect_timeout(1);
    let client = DiscoveryClient::new(config)?;
    let app = App::new("10.255.255.1/myapp", Labels::new())?;

    let started = Instant::now();
    let err = client.discover_aci_endpoints(&app).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.attempts().len(), 2);
    for attempt in err.attempts() {
        assert!(
            matches!(attempt.error, DiscoveryError::Network { .. }),
            "unexpected error: {}",
            attempt.error
        );
    }
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    Ok(())
}
