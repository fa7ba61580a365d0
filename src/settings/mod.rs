//! # Settings
//!
//! Resolution of the layered project configuration into an immutable
//! component tree.
//!
//! ## Layers
//!
//! Settings are read from, in increasing precedence:
//!
//! 1. `config/deployment.yml` (required, also marks the project root)
//! 2. `config/environments/{env}.yml`
//! 3. `config/environments/{env}-{profile}.yml`, when a profile is selected
//! 4. environment variables `{PREFIX}{SEP}{PATH}` (see [`env_override`])
//!
//! Mappings merge recursively; scalars and sequences are replaced.
//!
//! ## Tree
//!
//! Every node of the merged document has the shape
//!
//! ```yaml
//! config: {}        # free-form settings of the component
//! environment: {}   # values exported to generated env files
//! components:       # ordered child components
//!   child: { ... }
//! ```
//!
//! A component is enabled unless its `config.enabled` is `false`.
//!
//! ## Usage
//!
//! ```
//! use stackctl::settings::Settings;
//!
//! let doc = serde_yaml::from_str(
//!     "config:\n  name: acme\ncomponents:\n  be:\n    components:\n      application: ~\n",
//! )
//! .unwrap();
//! let settings = Settings::from_value("/srv/acme", "test", None, doc).unwrap();
//! assert_eq!(settings.stack_name().unwrap(), "acme");
//! assert!(settings.node(&["be", "application"]).is_ok());
//! ```

pub mod env_override;
pub mod loader;
pub mod merge;
pub mod path;

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

pub use loader::find_project_root;

/// Default prefix of settings override variables.
pub const DEFAULT_ENV_PREFIX: &str = "STACK";
/// Default separator between path segments in override variables.
pub const DEFAULT_ENV_SEPARATOR: &str = "__";
/// Environment used when none is selected.
pub const DEFAULT_ENV: &str = "development";

/// Inputs for [`Settings::load`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start_dir: PathBuf,
    pub env: String,
    pub profile: Option<String>,
    pub env_prefix: String,
    pub env_separator: String,
}

impl LoadOptions {
    pub fn new(start_dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            start_dir: start_dir.into(),
            env: env.into(),
            profile: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_separator: DEFAULT_ENV_SEPARATOR.to_string(),
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile.filter(|p| !p.is_empty());
        self
    }
}

/// A component of the settings tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub config: Mapping,
    pub environment: Mapping,
    pub components: Vec<Node>,
}

impl Node {
    /// Build a node from its YAML body. `null` yields an empty, enabled node.
    pub fn from_value(name: &str, value: &Value) -> Result<Self> {
        let mut node = Node {
            name: name.to_string(),
            ..Node::default()
        };
        let body = match value {
            Value::Null => return Ok(node),
            Value::Mapping(body) => body,
            _ => {
                return Err(Error::Config {
                    message: format!("component '{}' must be a mapping", name),
                    hint: Some("use 'config:', 'environment:' and 'components:' keys".to_string()),
                })
            }
        };

        node.config = section(name, body, "config")?;
        node.environment = section(name, body, "environment")?;
        for (key, child) in section(name, body, "components")? {
            let child_name = key.as_str().ok_or_else(|| {
                Error::config(format!("component names under '{}' must be strings", name))
            })?;
            node.components.push(Node::from_value(child_name, &child)?);
        }
        Ok(node)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.get("enabled").and_then(Value::as_bool) != Some(false)
    }

    /// Child component by name, enabled or not.
    pub fn component(&self, name: &str) -> Option<&Node> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Enabled children in declaration order.
    pub fn enabled_components(&self) -> impl Iterator<Item = &Node> {
        self.components.iter().filter(|c| c.is_enabled())
    }

    /// Descend through `names`, failing on the first missing component.
    pub fn descend(&self, names: &[&str]) -> Result<&Node> {
        names.iter().try_fold(self, |node, name| {
            node.component(name).ok_or_else(|| Error::UnknownSettingsPath {
                path: names.join("."),
            })
        })
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// String-valued config, also accepting numbers and booleans.
    pub fn config_str(&self, key: &str) -> Option<String> {
        self.config.get(key).and_then(scalar_to_string)
    }

    pub fn config_bool(&self, key: &str, default: bool) -> bool {
        self.config.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }
}

fn section(owner: &str, body: &Mapping, key: &str) -> Result<Mapping> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(map)) => Ok(map.clone()),
        Some(_) => Err(Error::config(format!(
            "'{}' of component '{}' must be a mapping",
            key, owner
        ))),
    }
}

/// Render a scalar as plain text. Mappings and sequences yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The resolved, immutable project settings.
#[derive(Debug, Clone)]
pub struct Settings {
    root: PathBuf,
    env: String,
    profile: Option<String>,
    document: Value,
    tree: Node,
}

impl Settings {
    /// Load from disk, applying overrides from the process environment.
    pub fn load(options: &LoadOptions) -> Result<Self> {
        Self::load_with_vars(options, std::env::vars())
    }

    /// Load from disk with an explicit set of override variables.
    pub fn load_with_vars<I>(options: &LoadOptions, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let root = find_project_root(&options.start_dir)?;
        let layers = loader::layers(&root, &options.env, options.profile.as_deref());
        let mut document = loader::load_layers(&layers)?;
        let applied = env_override::apply(
            &mut document,
            &options.env_prefix,
            &options.env_separator,
            vars,
        );
        log::debug!(
            "settings resolved for env '{}' ({} override(s))",
            options.env,
            applied
        );
        Self::from_value(root, &options.env, options.profile.as_deref(), document)
    }

    /// Build settings from an already merged document.
    pub fn from_value(
        root: impl Into<PathBuf>,
        env: &str,
        profile: Option<&str>,
        document: Value,
    ) -> Result<Self> {
        let tree = Node::from_value("", &document)?;
        Ok(Self {
            root: root.into(),
            env: env.to_string(),
            profile: profile.map(str::to_string),
            document,
            tree,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Strict lookup of a dotted path in the merged document.
    pub fn get(&self, path: &str) -> Result<&Value> {
        self.get_opt(path).ok_or_else(|| Error::UnknownSettingsPath {
            path: path.to_string(),
        })
    }

    /// Lookup that treats a missing path as absent.
    pub fn get_opt(&self, path: &str) -> Option<&Value> {
        path::lookup(&self.document, &path::parse(path))
    }

    /// Strict lookup of a component by its chain of names, e.g. `["be", "application"]`.
    pub fn node(&self, names: &[&str]) -> Result<&Node> {
        self.tree.descend(names)
    }

    pub fn node_opt(&self, names: &[&str]) -> Option<&Node> {
        self.tree.descend(names).ok()
    }

    /// Nodes from the root down to `names`, inclusive. Stops at the first missing name.
    pub fn lineage(&self, names: &[&str]) -> Vec<&Node> {
        let mut chain = vec![&self.tree];
        let mut current = &self.tree;
        for name in names {
            match current.component(name) {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => break,
            }
        }
        chain
    }

    /// The stack name, `config.name`.
    pub fn stack_name(&self) -> Result<String> {
        self.tree.config_str("name").ok_or_else(|| Error::Config {
            message: "config.name is not set".to_string(),
            hint: Some("add 'config: { name: <stack> }' to config/deployment.yml".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = r#"
config:
  name: acme
  image_registry: registry.local
components:
  be:
    config:
      compose_command: docker compose
    components:
      application:
        config:
          feature_set: main
        components:
          platform:
            environment:
              rails_env: test
            components:
              iam:
                config:
                  type: basic
              core: ~
              billing:
                config:
                  enabled: false
"#;

    fn settings() -> Settings {
        Settings::from_value("/srv/acme", "test", None, serde_yaml::from_str(BASE).unwrap())
            .unwrap()
    }

    #[test]
    fn test_tree_shape() {
        let s = settings();
        let platform = s.node(&["be", "application", "platform"]).unwrap();
        let names: Vec<&str> = platform.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["iam", "core", "billing"]);
        let enabled: Vec<&str> = platform
            .enabled_components()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(enabled, vec!["iam", "core"]);
        assert_eq!(
            platform.environment.get("rails_env").and_then(Value::as_str),
            Some("test")
        );
    }

    #[test]
    fn test_null_component_is_enabled_and_empty() {
        let s = settings();
        let core = s.node(&["be", "application", "platform", "core"]).unwrap();
        assert!(core.is_enabled());
        assert!(core.config.is_empty());
    }

    #[test]
    fn test_strict_get() {
        let s = settings();
        assert_eq!(
            s.get("components.be.config.compose_command")
                .unwrap()
                .as_str(),
            Some("docker compose")
        );
        let err = s.get("components.be.config.missing").unwrap_err();
        assert!(matches!(err, Error::UnknownSettingsPath { .. }));
        assert!(s.get_opt("components.be.config.missing").is_none());
    }

    #[test]
    fn test_strict_node() {
        let s = settings();
        assert!(matches!(
            s.node(&["be", "nope"]),
            Err(Error::UnknownSettingsPath { .. })
        ));
        assert!(s.node_opt(&["be", "nope"]).is_none());
    }

    #[test]
    fn test_lineage() {
        let s = settings();
        let chain = s.lineage(&["be", "application", "platform"]);
        let names: Vec<&str> = chain.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["", "be", "application", "platform"]);
    }

    #[test]
    fn test_non_mapping_component_rejected() {
        let doc = serde_yaml::from_str("components:\n  be: 3\n").unwrap();
        assert!(Settings::from_value("/p", "test", None, doc).is_err());
    }

    #[test]
    fn test_stack_name_required() {
        let s = Settings::from_value("/p", "test", None, serde_yaml::from_str("config: {}").unwrap())
            .unwrap();
        assert!(s.stack_name().is_err());
    }

    #[test]
    fn test_load_with_vars_precedence() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        fs::create_dir_all(config.join("environments")).unwrap();
        fs::write(config.join("deployment.yml"), "config:\n  name: base\n  region: base\n  tier: base\n  zone: base\n").unwrap();
        fs::write(config.join("environments/test.yml"), "config:\n  region: env\n  tier: env\n  zone: env\n").unwrap();
        fs::write(config.join("environments/test-blue.yml"), "config:\n  tier: profile\n  zone: profile\n").unwrap();

        let options = LoadOptions::new(dir.path(), "test").with_profile(Some("blue".to_string()));
        let vars = vec![("STACK__CONFIG__ZONE".to_string(), "var".to_string())];
        let s = Settings::load_with_vars(&options, vars).unwrap();

        assert_eq!(s.tree().config_str("name").as_deref(), Some("base"));
        assert_eq!(s.tree().config_str("region").as_deref(), Some("env"));
        assert_eq!(s.tree().config_str("tier").as_deref(), Some("profile"));
        assert_eq!(s.tree().config_str("zone").as_deref(), Some("var"));
        assert_eq!(s.profile(), Some("blue"));
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        fs::create_dir_all(&config).unwrap();
        fs::write(config.join("deployment.yml"), "config:\n  name: base\n").unwrap();

        std::env::set_var("STACKTEST__CONFIG__NAME", "from-env");
        let mut options = LoadOptions::new(dir.path(), "test");
        options.env_prefix = "STACKTEST".to_string();
        let s = Settings::load(&options);
        std::env::remove_var("STACKTEST__CONFIG__NAME");

        assert_eq!(s.unwrap().stack_name().unwrap(), "from-env");
    }
}
