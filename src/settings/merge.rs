//! Deep merge of settings layers.

use log::debug;
use serde_yaml::Value;

/// Merge `source` into `target`.
///
/// Mappings merge key by key, recursively. Any other pairing replaces the
/// target value wholesale, so a sequence in a later layer replaces the
/// sequence of an earlier one instead of extending it.
pub fn merge_values(target: &mut Value, source: &Value, path: &str) {
    match (target.as_mapping_mut(), source.as_mapping()) {
        (Some(target_map), Some(source_map)) => {
            for (key, value) in source_map {
                let key_str = match key {
                    Value::String(s) => s.clone(),
                    other => format!("{:?}", other),
                };
                let child_path = if path.is_empty() {
                    key_str
                } else {
                    format!("{}.{}", path, key_str)
                };
                match target_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value, &child_path),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        _ => {
            if source.is_sequence() && target.is_sequence() {
                debug!("replacing sequence at '{}'", path);
            }
            *target = source.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_nested_mappings_merge() {
        let mut base = yaml("config:\n  name: acme\n  region: us\n");
        merge_values(&mut base, &yaml("config:\n  region: eu\n  extra: 1\n"), "");
        assert_eq!(base, yaml("config:\n  name: acme\n  region: eu\n  extra: 1\n"));
    }

    #[test]
    fn test_sequences_replaced() {
        let mut base = yaml("ports: [1, 2, 3]\n");
        merge_values(&mut base, &yaml("ports: [9]\n"), "");
        assert_eq!(base, yaml("ports: [9]\n"));
    }

    #[test]
    fn test_scalar_replaces_mapping() {
        let mut base = yaml("dns:\n  root_domain: example.com\n");
        merge_values(&mut base, &yaml("dns: ~\n"), "");
        assert_eq!(base, yaml("dns: ~\n"));
    }

    #[test]
    fn test_mapping_fills_null() {
        let mut base = yaml("iam: ~\n");
        merge_values(&mut base, &yaml("iam:\n  config:\n    type: basic\n"), "");
        assert_eq!(base, yaml("iam:\n  config:\n    type: basic\n"));
    }

    #[test]
    fn test_key_order_kept() {
        let mut base = yaml("b: 1\na: 2\n");
        merge_values(&mut base, &yaml("c: 3\nb: 4\n"), "");
        let keys: Vec<&str> = base
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
