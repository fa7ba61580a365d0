//! Settings path expressions.
//!
//! Paths address values in the merged settings document:
//! `components.be.config.compose_command`, `config.terraform.state`,
//! `components.be.components.application.components.platform.components["core"]`,
//! `config.endpoints[0]`.

use serde_yaml::Value;

/// A single step in a settings path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Split a path into segments.
///
/// Dots separate keys, `\.` is a literal dot, `[n]` indexes a sequence and
/// `["key"]` or `['key']` address keys containing separators.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.trim().chars().peekable();

    let flush = |key: &mut String, segments: &mut Vec<Segment>| {
        if !key.is_empty() {
            segments.push(Segment::Key(std::mem::take(key)));
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    key.push(next);
                }
            }
            '.' => flush(&mut key, &mut segments),
            '[' => {
                flush(&mut key, &mut segments);
                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim();
                let quoted = inner.len() >= 2
                    && ((inner.starts_with('"') && inner.ends_with('"'))
                        || (inner.starts_with('\'') && inner.ends_with('\'')));
                if quoted {
                    segments.push(Segment::Key(inner[1..inner.len() - 1].to_string()));
                } else if let Ok(index) = inner.parse::<usize>() {
                    segments.push(Segment::Index(index));
                } else if !inner.is_empty() {
                    segments.push(Segment::Key(inner.to_string()));
                }
            }
            _ => key.push(ch),
        }
    }
    flush(&mut key, &mut segments);
    segments
}

/// Follow `segments` from `root`. `None` when any step is missing.
pub fn lookup<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match segment {
        Segment::Key(key) => current.as_mapping()?.get(key.as_str()),
        Segment::Index(index) => current.as_sequence()?.get(*index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Segment {
        Segment::Key(s.to_string())
    }

    #[test]
    fn test_parse_dotted() {
        assert_eq!(
            parse("components.be.config"),
            vec![key("components"), key("be"), key("config")]
        );
    }

    #[test]
    fn test_parse_index_and_quoted() {
        assert_eq!(
            parse(r#"config.endpoints[1]["api.host"]"#),
            vec![
                key("config"),
                key("endpoints"),
                Segment::Index(1),
                key("api.host")
            ]
        );
    }

    #[test]
    fn test_parse_escaped_dot() {
        assert_eq!(parse(r"labels.app\.kubernetes\.io"), vec![key("labels"), key("app.kubernetes.io")]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("  ").is_empty());
    }

    #[test]
    fn test_lookup() {
        let doc: Value = serde_yaml::from_str(
            "config:\n  name: acme\n  hosts: [a, b]\n",
        )
        .unwrap();
        assert_eq!(
            lookup(&doc, &parse("config.name")).and_then(Value::as_str),
            Some("acme")
        );
        assert_eq!(
            lookup(&doc, &parse("config.hosts[1]")).and_then(Value::as_str),
            Some("b")
        );
        assert!(lookup(&doc, &parse("config.missing")).is_none());
        assert!(lookup(&doc, &parse("config.name.deeper")).is_none());
    }
}
