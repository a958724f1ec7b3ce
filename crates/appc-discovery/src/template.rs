//! URI template rendering.
//!
//! Templates use `{name}`, `{<label>}` and `{ext}` placeholders. Rendering is
//! plain substring replacement; a template that still contains a `{...}`
//! placeholder afterwards is not fully resolved and the declaration it came
//! from does not apply.

use std::sync::OnceLock;

use regex::Regex;

use crate::app::App;

/// `{ext}` value for image URLs.
pub const EXT_ACI: &str = "aci";

/// `{ext}` value for detached signature URLs.
pub const EXT_ASC: &str = "aci.asc";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{.*?\}").expect("placeholder pattern is a valid regex"))
}

enum Segment {
    Template(String),
    Rendered(String),
}

/// Replace each `(placeholder, value)` pair in order.
///
/// Text inserted by one pair is never scanned by later pairs. Returns the
/// rendered string and whether no `{...}` placeholder remains.
///
/// # Examples
///
/// ```
/// use appc_discovery::template::render;
///
/// let (uri, ok) = render("https://example.com/{name}.{ext}", &[("{name}", "app")]);
/// assert_eq!(uri, "https://example.com/app.{ext}");
/// assert!(!ok);
/// ```
pub fn render<K, V>(template: &str, vars: &[(K, V)]) -> (String, bool)
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut segments = vec![Segment::Template(template.to_string())];

    for (key, value) in vars {
        let (key, value) = (key.as_ref(), value.as_ref());
        if key.is_empty() {
            continue;
        }
        let mut next = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Template(text) if text.contains(key) => {
                    let mut pieces = text.split(key).peekable();
                    while let Some(piece) = pieces.next() {
                        if !piece.is_empty() {
                            next.push(Segment::Template(piece.to_string()));
                        }
                        if pieces.peek().is_some() {
                            next.push(Segment::Rendered(value.to_string()));
                        }
                    }
                }
                other => next.push(other),
            }
        }
        segments = next;
    }

    let rendered: String = segments
        .into_iter()
        .map(|s| match s {
            Segment::Template(text) | Segment::Rendered(text) => text,
        })
        .collect();
    let resolved = !placeholder_pattern().is_match(&rendered);
    (rendered, resolved)
}

/// Variables for image templates: `{name}` first, then every label in key
/// order.
pub(crate) fn app_vars(app: &App) -> Vec<(String, String)> {
    let mut vars = Vec::with_capacity(app.labels.len() + 1);
    vars.push(("{name}".to_string(), app.name.to_string()));
    for (key, value) in app.labels.iter() {
        vars.push((format!("{{{}}}", key), value.to_string()));
    }
    vars
}

/// Variables for tag templates: only `{name}`.
pub(crate) fn name_vars(app: &App) -> Vec<(String, String)> {
    vec![("{name}".to_string(), app.name.to_string())]
}

/// Render the `{ext}` variants of an already rendered URI.
///
/// Returns `(data_url, signature_url)` only when both are fully resolved.
pub(crate) fn render_ext_pair(uri: &str) -> Option<(String, String)> {
    let (asc, ok) = render(uri, &[("{ext}", EXT_ASC)]);
    if !ok {
        return None;
    }
    let (aci, ok) = render(uri, &[("{ext}", EXT_ACI)]);
    if !ok {
        return None;
    }
    Some((aci, asc))
}
