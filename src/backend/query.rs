//! Parsing of external tool output.
//!
//! Container listings come from `docker ps` filtered on the labels written
//! into every compose manifest; cluster listings come from
//! `kubectl get ... -o json`.

use serde::Deserialize;

use crate::error::Result;
use crate::runner::CommandSpec;

/// Label carrying the component name on containers and pods.
pub const NAME_LABEL: &str = "app.kubernetes.io/name";
/// Label carrying the component role (profile) on pods.
pub const ROLE_LABEL: &str = "app.kubernetes.io/component";

/// `docker ps` listing the running components of one stack and feature set.
pub fn container_query(stack: &str, feature_set: &str, service: Option<&str>) -> CommandSpec {
    let mut spec = CommandSpec::new("docker")
        .arg("ps")
        .args(["--filter", "status=running"])
        .args(["--filter".to_string(), format!("label=stack.name={}", stack)])
        .args([
            "--filter".to_string(),
            format!("label=platform.feature_set={}", feature_set),
        ]);
    if let Some(service) = service {
        spec = spec.args([
            "--filter".to_string(),
            format!("label=application.component={}", service),
        ]);
    }
    spec.args(["--format", "{{.Label \"application.component\"}}"])
        .captured()
}

/// One component name per line; blanks dropped, duplicates removed.
pub fn parse_container_names(stdout: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !names.iter().any(|n| n == line) {
            names.push(line.to_string());
        }
    }
    names
}

/// Label selector for a component, optionally narrowed to a role.
pub fn label_selector(service: &str, role: Option<&str>) -> String {
    match role {
        Some(role) if !role.is_empty() => format!("{}={},{}={}", NAME_LABEL, service, ROLE_LABEL, role),
        _ => format!("{}={}", NAME_LABEL, service),
    }
}

/// A pod as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub phase: String,
}

#[derive(Debug, Deserialize)]
struct List {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    metadata: Metadata,
    #[serde(default)]
    status: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    phase: Option<String>,
}

/// Pods from `kubectl get pods -o json`.
pub fn parse_pods(json: &str) -> Result<Vec<PodRecord>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: List = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| PodRecord {
            name: item.metadata.name,
            phase: item
                .status
                .and_then(|s| s.phase)
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect())
}

/// Names of any listed resources, e.g. virtual services.
pub fn parse_item_names(json: &str) -> Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: List = serde_json::from_str(json)?;
    Ok(list.items.into_iter().map(|i| i.metadata.name).collect())
}

pub fn first_running(pods: &[PodRecord]) -> Option<&PodRecord> {
    pods.iter().find(|p| p.phase == "Running")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_query_filters() {
        let line = container_query("acme", "ci", Some("core")).to_string();
        assert!(line.starts_with("docker ps --filter status=running"));
        assert!(line.contains("--filter label=stack.name=acme"));
        assert!(line.contains("--filter label=platform.feature_set=ci"));
        assert!(line.contains("--filter label=application.component=core"));
    }

    #[test]
    fn test_parse_container_names() {
        assert_eq!(
            parse_container_names("core\n\niam\ncore\n"),
            vec!["core", "iam"]
        );
        assert!(parse_container_names("").is_empty());
    }

    #[test]
    fn test_label_selector() {
        assert_eq!(label_selector("core", None), "app.kubernetes.io/name=core");
        assert_eq!(
            label_selector("core", Some("worker")),
            "app.kubernetes.io/name=core,app.kubernetes.io/component=worker"
        );
    }

    #[test]
    fn test_parse_pods_and_first_running() {
        let json = r#"{"items":[
            {"metadata":{"name":"core-1"},"status":{"phase":"Pending"}},
            {"metadata":{"name":"core-2"},"status":{"phase":"Running"}},
            {"metadata":{"name":"core-3"}}
        ]}"#;
        let pods = parse_pods(json).unwrap();
        assert_eq!(pods.len(), 3);
        assert_eq!(pods[2].phase, "Unknown");
        assert_eq!(first_running(&pods).unwrap().name, "core-2");
    }

    #[test]
    fn test_parse_empty_lists() {
        assert!(parse_pods("").unwrap().is_empty());
        assert!(parse_pods(r#"{"items":[]}"#).unwrap().is_empty());
        assert!(first_running(&[]).is_none());
        assert_eq!(
            parse_item_names(r#"{"items":[{"metadata":{"name":"core"}}]}"#).unwrap(),
            vec!["core"]
        );
    }

    #[test]
    fn test_parse_pods_rejects_garbage() {
        assert!(parse_pods("not json").is_err());
    }
}
