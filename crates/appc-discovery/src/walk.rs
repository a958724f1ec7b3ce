//! Namespace walk.
//!
//! For `example.com/myapp/foobar` the walk visits `example.com/myapp/foobar`,
//! then `example.com/myapp`, then `example.com`, and stops at the first level
//! whose document yields at least one result for the requested class. Levels
//! visited before that are returned as failed attempts.
//!
//! Every class gets its own walk. Two walks for the same app may fetch the
//! same prefix; they share nothing.

use tracing::{debug, info};

use crate::app::App;
use crate::client::http::HttpBackend;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::insecure::InsecureOptions;
use crate::meta::{extract_meta, AcMeta};
use crate::template::{app_vars, name_vars, render, render_ext_pair};
use crate::types::{AciEndpoint, Discovered, DiscoveryClass, FailedAttempt, TagEndpoint};

/// Turns the declarations of one document into results for a class.
pub(crate) trait Collect {
    type Item;

    const CLASS: DiscoveryClass;

    fn collect(metas: &[AcMeta], app: &App) -> Vec<Self::Item>;
}

pub(crate) struct AciEndpoints;
pub(crate) struct PublicKeys;
pub(crate) struct TagEndpoints;

impl Collect for AciEndpoints {
    type Item = AciEndpoint;

    const CLASS: DiscoveryClass = DiscoveryClass::AciEndpoints;

    fn collect(metas: &[AcMeta], app: &App) -> Vec<AciEndpoint> {
        let vars = app_vars(app);
        declarations(metas, Self::CLASS)
            .filter_map(|m| {
                // {ext} is still unrendered here, so ignore the resolved flag.
                let (uri, _) = render(&m.uri, &vars);
                render_ext_pair(&uri).map(|(aci, asc)| AciEndpoint { aci, asc })
            })
            .collect()
    }
}

impl Collect for PublicKeys {
    type Item = String;

    const CLASS: DiscoveryClass = DiscoveryClass::PublicKeys;

    fn collect(metas: &[AcMeta], _app: &App) -> Vec<String> {
        declarations(metas, Self::CLASS)
            .map(|m| m.uri.clone())
            .collect()
    }
}

impl Collect for TagEndpoints {
    type Item = TagEndpoint;

    const CLASS: DiscoveryClass = DiscoveryClass::TagEndpoints;

    fn collect(metas: &[AcMeta], app: &App) -> Vec<TagEndpoint> {
        let vars = name_vars(app);
        declarations(metas, Self::CLASS)
            .filter_map(|m| {
                let (uri, _) = render(&m.uri, &vars);
                render_ext_pair(&uri).map(|(image_tags, asc)| TagEndpoint { image_tags, asc })
            })
            .collect()
    }
}

fn declarations(metas: &[AcMeta], class: DiscoveryClass) -> impl Iterator<Item = &AcMeta> + '_ {
    metas.iter().filter(move |m| m.name == class.meta_name())
}

/// Walk the app's namespace for one class.
pub(crate) async fn walk<C: Collect>(
    backend: &HttpBackend,
    app: &App,
    insecure: InsecureOptions,
) -> DiscoveryResult<Discovered<C::Item>> {
    let class = C::CLASS;
    let name = app.name.as_str();
    let mut attempts = Vec::new();

    for prefix in app.name.prefixes() {
        debug!(prefix, %class, "discovery walk step");

        let fetched = match backend.fetch_discovery(prefix, insecure).await {
            Ok(fetched) => fetched,
            Err(error) => {
                debug!(prefix, error = %error, "discovery fetch failed");
                attempts.push(FailedAttempt {
                    prefix: prefix.to_string(),
                    error,
                });
                continue;
            }
        };

        let applicable: Vec<AcMeta> = extract_meta(&fetched.body)
            .into_iter()
            .filter(|m| m.applies_to(name))
            .collect();

        let found = C::collect(&applicable, app);
        if !found.is_empty() {
            info!(
                prefix,
                url = %fetched.url,
                %class,
                count = found.len(),
                "discovery satisfied"
            );
            return Ok(Discovered {
                found,
                prefix: Some(prefix.to_string()),
                attempts,
            });
        }

        attempts.push(FailedAttempt {
            prefix: prefix.to_string(),
            error: DiscoveryError::NoDeclarations { class },
        });
    }

    debug!(app = name, %class, attempts = attempts.len(), "discovery exhausted");
    Err(DiscoveryError::NothingDiscovered { class, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Labels;

    fn meta(name: &str, prefix: &str, uri: &str) -> AcMeta {
        AcMeta {
            name: name.to_string(),
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        }
    }

    fn app(labels: &[(&str, &str)]) -> App {
        let mut l = Labels::new();
        for (k, v) in labels {
            l.insert(*k, *v).unwrap();
        }
        App::new("example.com/myapp", l).unwrap()
    }

    #[test]
    fn test_collect_aci_endpoints() {
        let metas = [meta(
            "ac-discovery",
            "example.com",
            "https://storage.example.com/{name}-{version}-{os}-{arch}.{ext}",
        )];
        let app = app(&[("version", "1.0.0"), ("os", "linux"), ("arch", "amd64")]);

        let eps = AciEndpoints::collect(&metas, &app);
        assert_eq!(
            eps,
            vec![AciEndpoint {
                aci: "https://storage.example.com/example.com/myapp-1.0.0-linux-amd64.aci"
                    .to_string(),
                asc: "https://storage.example.com/example.com/myapp-1.0.0-linux-amd64.aci.asc"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn test_collect_skips_unrenderable_templates() {
        let metas = [
            meta(
                "ac-discovery",
                "example.com",
                "https://storage.example.com/{name}-{version}-{os}.{ext}",
            ),
            meta(
                "ac-discovery",
                "example.com",
                "https://storage.example.com/{name}-{version}.{ext}",
            ),
        ];
        let app = app(&[("version", "1.0.0")]);

        let eps = AciEndpoints::collect(&metas, &app);
        assert_eq!(eps.len(), 1);
        assert_eq!(
            eps[0].aci,
            "https://storage.example.com/example.com/myapp-1.0.0.aci"
        );
    }

    #[test]
    fn test_collect_public_keys_verbatim() {
        let metas = [
            meta("ac-discovery-pubkeys", "example.com", "https://example.com/pubkeys.gpg"),
            meta("ac-discovery", "example.com", "https://example.com/{name}.{ext}"),
        ];
        let keys = PublicKeys::collect(&metas, &app(&[]));
        assert_eq!(keys, vec!["https://example.com/pubkeys.gpg".to_string()]);
    }

    #[test]
    fn test_collect_tag_endpoints_use_name_only() {
        let metas = [
            meta(
                "ac-discovery-tags",
                "example.com",
                "https://example.com/{name}/tags.{ext}",
            ),
            meta(
                "ac-discovery-tags",
                "example.com",
                "https://example.com/{name}-{version}/tags.{ext}",
            ),
        ];
        let tags = TagEndpoints::collect(&metas, &app(&[("version", "1.0.0")]));
        assert_eq!(
            tags,
            vec![TagEndpoint {
                image_tags: "https://example.com/example.com/myapp/tags.aci".to_string(),
                asc: "https://example.com/example.com/myapp/tags.aci.asc".to_string(),
            }]
        );
    }
}
