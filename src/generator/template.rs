//! Manifest templates.
//!
//! Templates are plain text with `${name}` and `${name:-default}`
//! placeholders. `$${name}` is left in the output as `${name}` so compose
//! files can keep their own interpolation. `${name|quote}` (also with a
//! default, `${name|quote:-default}`) renders the value as a double-quoted
//! YAML scalar; the built-in manifests use it for every scalar taken from
//! settings. Project templates under
//! `{root}/templates/{compose|skaffold}/{type}.yml` shadow the built-in ones.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::naming::BackendKind;

/// Values available to a template, keyed by dotted name.
pub type Variables = BTreeMap<String, String>;

const PLACEHOLDER: &str = r"\$(\$)?\{([A-Za-z0-9_.\-]+)(?:\|([a-z]+))?(?::-([^}]*))?\}";

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "compose",
        "service",
        include_str!("../../assets/templates/compose/service.yml"),
    ),
    (
        "compose",
        "basic",
        include_str!("../../assets/templates/compose/basic.yml"),
    ),
    (
        "compose",
        "proxy",
        include_str!("../../assets/templates/compose/proxy.conf"),
    ),
    (
        "skaffold",
        "service",
        include_str!("../../assets/templates/skaffold/service.yml"),
    ),
    (
        "skaffold",
        "basic",
        include_str!("../../assets/templates/skaffold/basic.yml"),
    ),
];

/// Find the template text for `template_type` on `backend`.
pub fn load(template_dir: &Path, backend: BackendKind, template_type: &str) -> Result<String> {
    let dir = backend.template_dir();
    let extension = if template_type == "proxy" { "conf" } else { "yml" };
    let override_path = template_dir
        .join(dir)
        .join(format!("{}.{}", template_type, extension));
    if override_path.is_file() {
        log::debug!("using project template {}", override_path.display());
        return Ok(fs::read_to_string(&override_path)?);
    }
    BUILTIN
        .iter()
        .find(|(d, t, _)| *d == dir && *t == template_type)
        .map(|(_, _, text)| text.to_string())
        .ok_or_else(|| Error::TemplateNotFound {
            template_type: template_type.to_string(),
            backend: dir.to_string(),
        })
}

/// Substitute every placeholder in `template`.
pub fn render(template: &str, vars: &Variables) -> Result<String> {
    let pattern = Regex::new(PLACEHOLDER)?;
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in pattern.captures_iter(template) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        if caps.get(1).is_some() {
            out.push_str(&whole.as_str()[1..]);
            continue;
        }
        let name = &caps[2];
        let filter = caps.get(3).map(|m| m.as_str());
        let default = caps.get(4);
        // An empty value falls back to the default when one is given.
        let value = vars
            .get(name)
            .filter(|v| !v.is_empty() || default.is_none());
        let text = match (value, default) {
            (Some(value), _) => value.as_str(),
            (None, Some(default)) => default.as_str(),
            (None, None) => {
                return Err(Error::Template {
                    message: "undefined variable".to_string(),
                    variable: Some(name.to_string()),
                })
            }
        };
        match filter {
            None => out.push_str(text),
            Some("quote") => out.push_str(&quote(text)),
            Some(other) => {
                return Err(Error::Template {
                    message: format!("unknown filter '{}'", other),
                    variable: Some(name.to_string()),
                })
            }
        }
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// A double-quoted YAML scalar holding exactly `value`.
///
/// JSON string syntax is a subset of YAML's double-quoted style.
pub fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Render a list as a YAML flow sequence of quoted strings.
pub fn flow_sequence<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = items.into_iter().map(|s| quote(s.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}
