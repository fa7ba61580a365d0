//! Per-service view used while rendering manifests.

use std::path::{Component, Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::template::{flow_sequence, quote, Variables};
use super::Family;
use crate::naming::Naming;
use crate::settings::{scalar_to_string, Node};

/// Template type used when a component does not name one.
pub const DEFAULT_TYPE: &str = "service";

/// A component of a family with its derived deployment attributes.
#[derive(Debug, Clone)]
pub struct ServiceDefinition<'a> {
    pub node: &'a Node,
    pub family: Family,
    pub deploy_path: PathBuf,
    root: &'a Path,
    naming: &'a Naming,
}

impl<'a> ServiceDefinition<'a> {
    pub fn new(
        node: &'a Node,
        family: Family,
        deploy_path: PathBuf,
        root: &'a Path,
        naming: &'a Naming,
    ) -> Self {
        Self {
            node,
            family,
            deploy_path,
            root,
            naming,
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn template_type(&self) -> String {
        self.node
            .config_str("type")
            .unwrap_or_else(|| DEFAULT_TYPE.to_string())
    }

    /// Basic services run a stock image and skip build and migrations.
    pub fn is_basic(&self) -> bool {
        self.template_type() == "basic"
    }

    pub fn repository(&self) -> String {
        self.node
            .config_str("repository")
            .unwrap_or_else(|| self.name().to_string())
    }

    pub fn image_repository(&self) -> String {
        match &self.naming.image_registry {
            Some(registry) if !registry.is_empty() => {
                format!("{}/{}", registry.trim_end_matches('/'), self.repository())
            }
            _ => self.repository(),
        }
    }

    pub fn tag(&self) -> String {
        match self.node.config_str("tag") {
            Some(tag) => tag,
            None if self.is_basic() => "latest".to_string(),
            None => self.naming.image_tag.clone(),
        }
    }

    pub fn image(&self) -> String {
        self.node
            .config_str("image")
            .unwrap_or_else(|| format!("{}:{}", self.image_repository(), self.tag()))
    }

    pub fn chart(&self) -> String {
        match self.node.config_str("chart") {
            Some(chart) => chart,
            None if self.is_basic() => self.name().to_string(),
            None => "service".to_string(),
        }
    }

    pub fn ports(&self) -> Vec<String> {
        self.string_list("ports")
    }

    /// Compose volume entries from `config.volumes`.
    pub fn volumes(&self) -> Vec<String> {
        self.string_list("volumes")
    }

    /// Deploy profiles; empty means a single pass without `-p`.
    pub fn profiles(&self) -> Vec<String> {
        self.string_list("profiles")
    }

    pub fn replicas(&self) -> u64 {
        self.node.config_u64("replicas").unwrap_or(1)
    }

    pub fn has_environment(&self) -> bool {
        !self.node.environment.is_empty()
    }

    /// Env file of this service, written only when it has an environment.
    pub fn env_file(&self) -> PathBuf {
        self.deploy_path.join(format!("{}.env", self.name()))
    }

    pub fn manifest(&self) -> PathBuf {
        self.deploy_path.join(format!("{}.yml", self.name()))
    }

    /// Env files loaded into the container: family file, then the service's own.
    pub fn env_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.deploy_path.join(self.family.env_file_name())];
        if self.has_environment() {
            files.push(self.env_file());
        }
        files
    }

    /// Names of the cluster secrets mounted into the service.
    pub fn secrets_files(&self) -> Vec<String> {
        let mut names = vec![self.family.slug().to_string()];
        if self.has_environment() {
            names.push(self.name().to_string());
        }
        names
    }

    /// Build context relative to the deploy path.
    pub fn context_path(&self) -> String {
        let depth = self
            .deploy_path
            .strip_prefix(self.root)
            .map(|rel| {
                rel.components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .count()
            })
            .unwrap_or(0);
        let mut parts: Vec<String> = vec!["..".to_string(); depth];
        if let Some(context) = self.node.config_str("context") {
            parts.push(context.trim_matches('/').to_string());
        }
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }

    /// Template variables for this service layered over `stack`.
    pub fn variables(&self, stack: &Variables) -> Variables {
        let mut vars = stack.clone();
        let env_files: Vec<String> = self
            .env_files()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let profile_entries: Vec<String> = self
            .profiles()
            .iter()
            .map(|p| format!("{{name: {}}}", quote(p)))
            .collect();

        let own = [
            ("service.name", self.name().to_string()),
            ("service.family", self.family.slug().to_string()),
            ("service.type", self.template_type()),
            ("service.repository", self.repository()),
            ("service.image_repository", self.image_repository()),
            ("service.tag", self.tag()),
            ("service.image", self.image()),
            ("service.chart", self.chart()),
            ("service.chart_path", format!("helm-charts/{}", self.chart())),
            ("service.ports", flow_sequence(self.ports())),
            ("service.volumes", flow_sequence(self.volumes())),
            ("service.profiles", flow_sequence(self.profiles())),
            ("service.profile_entries", format!("[{}]", profile_entries.join(", "))),
            ("service.replicas", self.replicas().to_string()),
            ("service.context_path", self.context_path()),
            ("service.env_files", flow_sequence(env_files)),
            ("service.secrets_files", flow_sequence(self.secrets_files())),
        ];
        for (key, value) in own {
            vars.insert(key.to_string(), value);
        }
        flatten_config(&mut vars, "config", &self.node.config);
        vars
    }

    fn string_list(&self, key: &str) -> Vec<String> {
        match self.node.config_value(key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn flatten_config(vars: &mut Variables, prefix: &str, map: &Mapping) {
    for (key, value) in map {
        let key = match scalar_to_string(key) {
            Some(k) => format!("{}.{}", prefix, k),
            None => continue,
        };
        match value {
            Value::Mapping(child) => flatten_config(vars, &key, child),
            Value::Sequence(items) => {
                let list: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
                vars.insert(key, flow_sequence(list));
            }
            other => {
                if let Some(text) = scalar_to_string(other) {
                    vars.insert(key, text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context_at, PROJECT};

    #[test]
    fn test_accessors_for_basic_service() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let iam = ctx
            .settings
            .node(&["be", "application", "platform", "iam"])
            .unwrap();
        let def = ServiceDefinition::new(
            iam,
            Family::Platform,
            ctx.layout.deploy_path(Family::Platform),
            ctx.layout.root(),
            &ctx.naming,
        );
        assert!(def.is_basic());
        assert_eq!(def.tag(), "latest");
        assert_eq!(def.image(), "iam:latest");
        assert_eq!(def.ports(), vec!["3001:3000"]);
        assert!(def.profiles().is_empty());
        assert_eq!(def.replicas(), 1);
        assert_eq!(def.secrets_files(), vec!["platform"]);
        assert_eq!(def.context_path(), "../../../../..");
    }

    #[test]
    fn test_accessors_for_built_service() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let core = ctx
            .settings
            .node(&["be", "application", "platform", "core"])
            .unwrap();
        let def = ServiceDefinition::new(
            core,
            Family::Platform,
            ctx.layout.deploy_path(Family::Platform),
            ctx.layout.root(),
            &ctx.naming,
        );
        assert_eq!(def.template_type(), "service");
        assert_eq!(def.tag(), "0.0.0-no-sha");
        assert_eq!(def.chart(), "service");
        assert_eq!(def.secrets_files(), vec!["platform", "core"]);
        assert_eq!(def.env_files().len(), 2);

        let vars = def.variables(&Variables::new());
        assert_eq!(vars["service.name"], "core");
        assert_eq!(vars["service.ports"], "[]");
        assert_eq!(vars["service.profile_entries"], "[]");
    }

    #[test]
    fn test_config_flattened_into_variables() {
        let node = Node::from_value(
            "core",
            &serde_yaml::from_str(
                "config:\n  command: sidekiq\n  resources:\n    cpu: 2\n  profiles: [server, worker]\n",
            )
            .unwrap(),
        )
        .unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let def = ServiceDefinition::new(
            &node,
            Family::Platform,
            ctx.layout.deploy_path(Family::Platform),
            ctx.layout.root(),
            &ctx.naming,
        );
        let vars = def.variables(&Variables::new());
        assert_eq!(vars["config.command"], "sidekiq");
        assert_eq!(vars["config.resources.cpu"], "2");
        assert_eq!(vars["service.profiles"], "[\"server\", \"worker\"]");
        assert_eq!(
            vars["service.profile_entries"],
            "[{name: \"server\"}, {name: \"worker\"}]"
        );
    }
}
