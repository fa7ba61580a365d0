//! # Manifest Generation
//!
//! Turns the components of a family into backend-specific manifests.
//!
//! A family owns one deploy path. Regeneration is all or nothing: the deploy
//! path is deleted ([`Generator::revoke`]) and rebuilt from the settings
//! ([`Generator::invoke`]), so the output only ever reflects the current
//! settings and templates. For each enabled component the generator writes
//! `{service}.yml` from the template named by `config.type` (default
//! `service`) and `{service}.env` when the component has an environment.
//! Each family also gets one shared env file.
//!
//! Backend extras:
//! - Instance: `compose.env` in the runtime dir, read by compose through the
//!   project's `.env` link. The proxy component gets the runtime proxy
//!   config bind-mounted as its nginx `default.conf`.
//! - Kubernetes: the static `devops/helm-charts` and `devops/kubernetes`
//!   bundles are copied next to the manifests.

pub mod service;
pub mod staleness;
pub mod template;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use walkdir::WalkDir;

use crate::context::Context;
use crate::envfile::EnvMap;
use crate::error::{Error, Result};
use crate::naming::BackendKind;

pub use service::ServiceDefinition;
pub use template::Variables;

/// Where the proxy container reads the generated locations.
pub const PROXY_CONFIG_MOUNT: &str = "/etc/nginx/conf.d/default.conf";

/// Groups of components generated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Application services built from the project (`be.application.platform`).
    Platform,
    /// Supporting services such as the proxy and databases (`be.application.services`).
    Services,
    /// Cluster-wide services (`be.infra.cluster.services`).
    ClusterServices,
    /// Data views (`be.data.views`).
    DataViews,
}

impl Family {
    pub const ALL: [Family; 4] = [
        Family::Services,
        Family::Platform,
        Family::ClusterServices,
        Family::DataViews,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Family::Platform => "platform",
            Family::Services => "services",
            Family::ClusterServices => "cluster",
            Family::DataViews => "views",
        }
    }

    /// Component names from the settings root to the family node.
    pub fn settings_path(&self) -> &'static [&'static str] {
        match self {
            Family::Platform => &["be", "application", "platform"],
            Family::Services => &["be", "application", "services"],
            Family::ClusterServices => &["be", "infra", "cluster", "services"],
            Family::DataViews => &["be", "data", "views"],
        }
    }

    pub fn env_file_name(&self) -> &'static str {
        match self {
            Family::Platform => "platform.env",
            Family::Services | Family::ClusterServices => "services.env",
            Family::DataViews => "views.env",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Family::ALL
            .into_iter()
            .find(|f| f.slug() == s)
            .ok_or_else(|| Error::Config {
                message: format!("unknown family '{}'", s),
                hint: Some("expected one of: platform, services, cluster, views".to_string()),
            })
    }
}

/// Writes artifacts for the families of one context.
pub struct Generator<'a> {
    ctx: &'a Context,
}

impl<'a> Generator<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Enabled components of `family` in settings order.
    pub fn services(&self, family: Family) -> Vec<ServiceDefinition<'a>> {
        let ctx = self.ctx;
        let Some(node) = ctx.settings.node_opt(family.settings_path()) else {
            return Vec::new();
        };
        let deploy_path = ctx.layout.deploy_path(family);
        node.enabled_components()
            .map(|component| {
                ServiceDefinition::new(
                    component,
                    family,
                    deploy_path.clone(),
                    ctx.layout.root(),
                    &ctx.naming,
                )
            })
            .collect()
    }

    pub fn service(&self, family: Family, name: &str) -> Option<ServiceDefinition<'a>> {
        self.services(family).into_iter().find(|s| s.name() == name)
    }

    /// Delete every artifact of `family`.
    pub fn revoke(&self, family: Family) -> Result<()> {
        let path = self.ctx.layout.deploy_path(family);
        if path.exists() {
            debug!("removing {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }

    /// Write every artifact of `family`; returns the written files.
    pub fn invoke(&self, family: Family) -> Result<Vec<PathBuf>> {
        let ctx = self.ctx;
        let backend = ctx.naming.backend;
        let deploy_path = ctx.layout.deploy_path(family);
        let stack = self.stack_variables();
        let mut written = Vec::new();

        for def in self.services(family) {
            let text = template::load(&ctx.layout.template_dir(), backend, &def.template_type())?;
            let rendered = template::render(&text, &self.service_variables(&def, &stack))?;
            written.push(write_file(&def.manifest(), &rendered)?);
            if def.has_environment() {
                let env = EnvMap::from_mapping(&def.node.environment);
                written.push(write_file(&def.env_file(), &env.render()?)?);
            }
        }

        let family_env = self.family_environment(family);
        written.push(write_file(
            &deploy_path.join(family.env_file_name()),
            &family_env.render()?,
        )?);

        match backend {
            BackendKind::Instance => {
                if family == Family::Platform {
                    written.push(self.write_compose_env()?);
                }
                // compose would create a directory at a missing bind source
                if family == Family::Services
                    && ctx.proxy_enabled()
                    && !ctx.layout.proxy_config().exists()
                {
                    self.write_proxy_config(&[])?;
                }
            }
            BackendKind::Kubernetes => {
                let devops = ctx.layout.devops_dir();
                for bundle in ["helm-charts", "kubernetes"] {
                    copy_tree(&devops.join(bundle), &deploy_path.join(bundle))?;
                }
            }
        }

        // the platform family carries the staleness marker
        if family == Family::Platform {
            write_file(
                &ctx.layout.generator_stamp(),
                &format!("{}\n", staleness::GENERATOR_VERSION),
            )?;
        }

        info!(
            "generated {} file(s) for {} in {}",
            written.len(),
            family,
            deploy_path.display()
        );
        Ok(written)
    }

    /// Revoke then invoke.
    pub fn regenerate(&self, family: Family) -> Result<Vec<PathBuf>> {
        self.revoke(family)?;
        self.invoke(family)
    }

    /// Regenerate the application families, supporting services first.
    pub fn regenerate_application(&self) -> Result<()> {
        self.regenerate(Family::Services)?;
        self.regenerate(Family::Platform)?;
        Ok(())
    }

    /// File whose age decides whether artifacts must be regenerated.
    pub fn marker(&self) -> PathBuf {
        match self.ctx.naming.backend {
            BackendKind::Instance => self.ctx.layout.compose_env(),
            BackendKind::Kubernetes => self
                .ctx
                .layout
                .deploy_path(Family::Platform)
                .join(Family::Platform.env_file_name()),
        }
    }

    pub fn is_stale(&self) -> Result<bool> {
        if !staleness::stamp_matches(
            &self.ctx.layout.generator_stamp(),
            staleness::GENERATOR_VERSION,
        ) {
            debug!("artifacts were generated by another stackctl version");
            return Ok(true);
        }
        staleness::is_stale(
            &self.marker(),
            &self.ctx.layout.config_dir(),
            &self.ctx.layout.template_dir(),
        )
    }

    /// Regenerate the application families when the marker is stale.
    pub fn refresh(&self) -> Result<bool> {
        if self.is_stale()? {
            self.regenerate_application()?;
            return Ok(true);
        }
        debug!("generated artifacts are current");
        Ok(false)
    }

    /// Reverse-proxy locations for the running platform services.
    pub fn write_proxy_config(&self, running: &[String]) -> Result<PathBuf> {
        let ctx = self.ctx;
        let text = template::load(&ctx.layout.template_dir(), BackendKind::Instance, "proxy")?;
        let stack = self.stack_variables();
        let mut body = String::new();
        for def in self.services(Family::Platform) {
            if running.iter().any(|r| r == def.name()) {
                body.push_str(&template::render(&text, &def.variables(&stack))?);
            }
        }
        write_file(&ctx.layout.proxy_config(), &body)
    }

    /// Template variables of `def`, with the proxy config mounted into the proxy.
    pub fn service_variables(&self, def: &ServiceDefinition<'_>, stack: &Variables) -> Variables {
        let ctx = self.ctx;
        let mut vars = def.variables(stack);
        if ctx.naming.backend == BackendKind::Instance
            && def.family == Family::Services
            && def.name() == ctx.proxy_service()
        {
            let mut volumes = def.volumes();
            volumes.push(format!(
                "{}:{}:ro",
                ctx.layout.proxy_config().display(),
                PROXY_CONFIG_MOUNT
            ));
            vars.insert(
                "service.volumes".to_string(),
                template::flow_sequence(volumes),
            );
        }
        vars
    }

    /// Variables shared by every template.
    pub fn stack_variables(&self) -> Variables {
        let ctx = self.ctx;
        let naming = &ctx.naming;
        let skaffold_version = ctx
            .settings
            .node_opt(&["be"])
            .and_then(|be| be.config_str("skaffold_version"))
            .unwrap_or_else(|| "skaffold/v2beta29".to_string());
        [
            ("stack.name", naming.stack_name.clone()),
            ("stack.env", ctx.settings.env().to_string()),
            ("stack.feature_set", naming.feature_set.clone()),
            ("stack.compose_project_name", naming.compose_project_name.clone()),
            ("stack.namespace", naming.namespace.clone()),
            ("stack.hostname", naming.hostname.clone()),
            ("stack.api_uri", naming.api_uri.clone()),
            ("stack.image_tag", naming.image_tag.clone()),
            (
                "stack.image_registry",
                naming.image_registry.clone().unwrap_or_default(),
            ),
            ("stack.bucket_name", naming.bucket_name.clone()),
            ("stack.skaffold_version", skaffold_version),
            ("stack.project_root", ctx.layout.root().display().to_string()),
            ("stack.proxy_config", ctx.layout.proxy_config().display().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Environments from the settings root down to the family, plus generated values.
    pub fn family_environment(&self, family: Family) -> EnvMap {
        let ctx = self.ctx;
        let mut env = EnvMap::new();
        for node in ctx.settings.lineage(family.settings_path()) {
            env.extend(&EnvMap::from_mapping(&node.environment));
        }
        let naming = &ctx.naming;
        env.insert("PLATFORM__ENV", ctx.settings.env());
        env.insert("PLATFORM__FEATURE_SET", naming.feature_set.as_str());
        env.insert("PLATFORM__HOSTS", naming.hostname.as_str());
        env.insert("PLATFORM__API_URI", naming.api_uri.as_str());
        env.insert("PLATFORM__BUCKET_NAME", naming.bucket_name.as_str());
        env
    }

    fn write_compose_env(&self) -> Result<PathBuf> {
        let ctx = self.ctx;
        let root = ctx.layout.root();
        let mut files = Vec::new();
        for family in [Family::Services, Family::Platform] {
            let pattern = ctx.layout.deploy_path(family).join("*.yml");
            for path in glob::glob(&pattern.to_string_lossy())?.flatten() {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                files.push(rel.display().to_string());
            }
        }
        files.sort();

        let naming = &ctx.naming;
        let mut env = EnvMap::new();
        env.insert("COMPOSE_FILE", files.join(":"));
        env.insert("COMPOSE_PROJECT_NAME", naming.compose_project_name.as_str());
        env.insert("CONTEXT_DIR", root.display().to_string());
        env.insert(
            "IMAGE_REPOSITORY",
            naming
                .image_registry
                .clone()
                .unwrap_or_else(|| naming.stack_name.clone()),
        );
        env.insert("IMAGE_TAG", naming.image_tag.as_str());
        if let Some((uid, gid)) = owner_ids(root) {
            env.insert("PUID", uid.to_string());
            env.insert("PGID", gid.to_string());
        }

        let content = format!(
            "# This file was auto generated\n# The values are used by docker compose\n# {}\n{}",
            ctx.settings.env(),
            env.render()?
        );
        write_file(&ctx.layout.compose_env(), &content)
    }
}

#[cfg(target_os = "linux")]
fn owner_ids(root: &Path) -> Option<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;
    root.metadata().ok().map(|m| (m.uid(), m.gid()))
}

#[cfg(not(target_os = "linux"))]
fn owner_ids(_root: &Path) -> Option<(u32, u32)> {
    None
}

/// Write `content` to `path`, creating parent directories.
pub(crate) fn write_file(path: &Path, content: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(path.to_path_buf())
}

/// Copy the files under `src` into `dst`. A missing `src` copies nothing.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("walking {}: {}", src.display(), e),
        })?;
        let rel = entry.path().strip_prefix(src).map_err(|e| Error::Filesystem {
            message: e.to_string(),
        })?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    debug!("copied {} file(s) from {}", copied, src.display());
    Ok(copied)
}
