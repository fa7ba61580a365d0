//! `KEY=value` env files.
//!
//! Nested settings are flattened into upper-case keys joined with `__`:
//! `platform: { hosts: x }` becomes `PLATFORM__HOSTS=x`.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Separator between nested key segments.
pub const KEY_SEPARATOR: &str = "__";

/// Ordered key/value pairs; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    entries: Vec<(String, String)>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Later maps win.
    pub fn extend(&mut self, other: &EnvMap) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Same key/value pairs, ignoring order.
    pub fn same_entries(&self, other: &EnvMap) -> bool {
        self.as_sorted() == other.as_sorted()
    }

    fn as_sorted(&self) -> BTreeMap<&str, &str> {
        self.iter().collect()
    }

    /// Flatten a settings mapping.
    pub fn from_mapping(map: &Mapping) -> Self {
        let mut env = EnvMap::new();
        flatten_into(&mut env, "", map);
        env
    }

    /// File contents, one `KEY=value` line per entry.
    ///
    /// Neither compose nor `kubectl --from-env-file` unquote values, so a
    /// value spanning lines cannot be written faithfully and is rejected.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for (k, v) in &self.entries {
            if v.contains(['\n', '\r']) {
                return Err(Error::Config {
                    message: format!("value of {} spans multiple lines", k),
                    hint: Some(
                        "env files hold one KEY=value per line; encode the value (e.g. base64)"
                            .to_string(),
                    ),
                });
            }
            out.push_str(&format!("{}={}\n", k, v));
        }
        Ok(out)
    }
}

fn flatten_into(env: &mut EnvMap, prefix: &str, map: &Mapping) {
    for (key, value) in map {
        let name = match key {
            Value::String(s) => s.to_uppercase(),
            other => match crate::settings::scalar_to_string(other) {
                Some(s) => s.to_uppercase(),
                None => continue,
            },
        };
        let full = if prefix.is_empty() {
            name
        } else {
            format!("{}{}{}", prefix, KEY_SEPARATOR, name)
        };
        match value {
            Value::Mapping(child) => flatten_into(env, &full, child),
            Value::Sequence(items) => {
                let joined: Vec<String> = items
                    .iter()
                    .filter_map(crate::settings::scalar_to_string)
                    .collect();
                env.insert(full, joined.join(","));
            }
            Value::Null => env.insert(full, ""),
            other => env.insert(
                full,
                crate::settings::scalar_to_string(other).unwrap_or_default(),
            ),
        }
    }
}

/// Parse env file text.
///
/// Blank lines and `#` comments are skipped; each line splits on its first
/// `=`; a line without `=` yields an empty value.
pub fn parse_env_file(text: &str) -> EnvMap {
    let mut env = EnvMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v),
            None => (line, ""),
        };
        if !key.is_empty() {
            env.insert(key, value);
        }
    }
    env
}
