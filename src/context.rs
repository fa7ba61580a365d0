//! The per-run context shared by generators, backends and commands.

use std::path::PathBuf;

use crate::error::Result;
use crate::git::VcsInfo;
use crate::layout::Layout;
use crate::naming::Naming;
use crate::settings::{LoadOptions, Node, Settings};

/// Default compose invocation.
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker compose";
/// Default name of the identity service whose credentials are cached.
pub const DEFAULT_IDENTITY_SERVICE: &str = "iam";
/// Default name of the reverse proxy component.
pub const DEFAULT_PROXY_SERVICE: &str = "nginx";

/// Settings, naming and layout resolved once for a run.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub vcs: VcsInfo,
    pub naming: Naming,
    pub layout: Layout,
}

impl Context {
    pub fn new(settings: Settings, vcs: VcsInfo) -> Result<Self> {
        let naming = Naming::resolve(&settings, &vcs)?;
        let layout = Layout::new(settings.root(), settings.env(), &naming.feature_set);
        Ok(Self {
            settings,
            vcs,
            naming,
            layout,
        })
    }

    /// Load settings from disk and read VCS metadata at the project root.
    pub fn load(options: &LoadOptions) -> Result<Self> {
        let settings = Settings::load(options)?;
        let vcs = VcsInfo::detect(settings.root());
        Self::new(settings, vcs)
    }

    pub fn application(&self) -> Option<&Node> {
        self.settings.node_opt(&["be", "application"])
    }

    pub fn platform_node(&self) -> Option<&Node> {
        self.settings.node_opt(&["be", "application", "platform"])
    }

    /// Enabled platform services in settings order.
    pub fn platform_services(&self) -> Vec<String> {
        self.platform_node()
            .map(|p| p.enabled_components().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_platform_service(&self, name: &str) -> bool {
        self.platform_node()
            .and_then(|p| p.component(name))
            .is_some_and(Node::is_enabled)
    }

    /// Enabled application support services (proxy, databases, ...).
    pub fn application_services(&self) -> Vec<String> {
        self.settings
            .node_opt(&["be", "application", "services"])
            .map(|s| s.enabled_components().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn identity_service(&self) -> String {
        self.application()
            .and_then(|a| a.config_str("identity_service"))
            .unwrap_or_else(|| DEFAULT_IDENTITY_SERVICE.to_string())
    }

    pub fn proxy_service(&self) -> String {
        self.application()
            .and_then(|a| a.config_str("proxy_service"))
            .unwrap_or_else(|| DEFAULT_PROXY_SERVICE.to_string())
    }

    /// Whether the reverse proxy is part of this deployment.
    pub fn proxy_enabled(&self) -> bool {
        let proxy = self.proxy_service();
        self.application_services().iter().any(|s| *s == proxy)
    }

    /// Compose program and leading arguments, e.g. `["docker", "compose"]`.
    pub fn compose_command(&self) -> Vec<String> {
        let configured = self
            .settings
            .node_opt(&["be"])
            .and_then(|be| be.config_str("compose_command"))
            .unwrap_or_else(|| DEFAULT_COMPOSE_COMMAND.to_string());
        let parts: Vec<String> = configured.split_whitespace().map(str::to_string).collect();
        if parts.is_empty() {
            DEFAULT_COMPOSE_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect()
        } else {
            parts
        }
    }

    /// Kube-config location; `infra.config.kubeconfig` or the user default.
    pub fn kubeconfig(&self) -> PathBuf {
        self.settings
            .node_opt(&["be", "infra"])
            .and_then(|infra| infra.config_str("kubeconfig"))
            .map(|p| crate::defaults::expand_home(&p))
            .unwrap_or_else(crate::defaults::default_kubeconfig)
    }

    /// Docker credentials copied into the registry pull secret;
    /// `infra.config.docker_config` or the user default.
    pub fn docker_config(&self) -> PathBuf {
        self.settings
            .node_opt(&["be", "infra"])
            .and_then(|infra| infra.config_str("docker_config"))
            .map(|p| crate::defaults::expand_home(&p))
            .unwrap_or_else(crate::defaults::default_docker_config)
    }
}
