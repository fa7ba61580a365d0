//! Environment variable overrides.
//!
//! A variable such as `STACK__COMPONENTS__BE__CONFIG__COMPOSE_COMMAND=podman-compose`
//! sets `components.be.config.compose_command`. Path segments match existing
//! keys case-insensitively; segments with no match create lower-cased keys.
//! Values are read as YAML scalars so `true` and `3` keep their types.

use log::debug;
use serde_yaml::{Mapping, Value};

/// Apply every variable in `vars` that starts with `{prefix}{separator}`.
///
/// Variables are applied in name order so the outcome does not depend on the
/// iteration order of the process environment. Returns the number applied.
pub fn apply<I>(doc: &mut Value, prefix: &str, separator: &str, vars: I) -> usize
where
    I: IntoIterator<Item = (String, String)>,
{
    if separator.is_empty() {
        return 0;
    }
    let lead = format!("{}{}", prefix, separator);
    let mut matching: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(&lead))
        .collect();
    matching.sort();

    let mut applied = 0;
    for (name, raw) in matching {
        let segments: Vec<&str> = name[lead.len()..]
            .split(separator)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            continue;
        }
        debug!("settings override from {}", name);
        set_path(doc, &segments, parse_scalar(&raw));
        applied += 1;
    }
    applied
}

fn set_path(doc: &mut Value, segments: &[&str], value: Value) {
    let mut current = doc;
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = match current.as_mapping_mut() {
            Some(map) => map,
            None => return,
        };
        let key = map
            .keys()
            .find(|k| k.as_str().is_some_and(|s| s.eq_ignore_ascii_case(segment)))
            .cloned()
            .unwrap_or_else(|| Value::String(segment.to_lowercase()));
        if i + 1 == segments.len() {
            map.insert(key, value);
            return;
        }
        current = map.entry(key).or_insert(Value::Null);
    }
}

fn parse_scalar(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::String(raw.to_string());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}
