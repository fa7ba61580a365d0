//! # Naming
//!
//! Derives every identifier shared by the generators and both backends:
//! feature set, compose project name, namespace, bucket name, hostname,
//! API URI, image tag and the backend kind. Everything is computed once
//! from the settings tree and the VCS metadata and then read from
//! [`Naming`].

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use semver::Version;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::git::VcsInfo;
use crate::settings::Settings;

/// File at the project root holding the release version.
pub const VERSION_FILE: &str = "VERSION";

/// The deployment backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Instance,
    Kubernetes,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Instance => "instance",
            BackendKind::Kubernetes => "kubernetes",
        }
    }

    /// Directory holding this backend's templates.
    pub fn template_dir(&self) -> &'static str {
        match self {
            BackendKind::Instance => "compose",
            BackendKind::Kubernetes => "skaffold",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "instance" => Ok(BackendKind::Instance),
            "kubernetes" => Ok(BackendKind::Kubernetes),
            other => Err(Error::Config {
                message: format!("unknown cluster type '{}'", other),
                hint: Some("cluster.config.type must be 'instance' or 'kubernetes'".to_string()),
            }),
        }
    }
}

/// Resolved identifiers for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub stack_name: String,
    pub base_feature_set: String,
    pub feature_set: String,
    /// `-{feature_set}` when the feature set differs from the base one.
    pub branch_suffix: String,
    pub compose_project_name: String,
    pub namespace: String,
    pub cluster_name: String,
    pub bucket_name: String,
    pub hostname: String,
    pub api_uri: String,
    pub version: Version,
    pub sha: String,
    pub image_tag: String,
    pub image_registry: Option<String>,
    pub backend: BackendKind,
}

impl Naming {
    pub fn resolve(settings: &Settings, vcs: &VcsInfo) -> Result<Self> {
        let stack_name = settings.stack_name()?;

        let application = settings.node(&["be", "application"])?;
        let base_feature_set = application.config_str("feature_set").ok_or_else(|| Error::Config {
            message: "application feature_set is not set".to_string(),
            hint: Some(
                "set components.be.components.application.config.feature_set".to_string(),
            ),
        })?;
        let feature_set = derive_feature_set(
            &base_feature_set,
            application.config_bool("feature_from_branch", false),
            vcs.branch.as_deref(),
        );
        let branch_suffix = if feature_set == base_feature_set {
            String::new()
        } else {
            format!("-{}", feature_set)
        };

        let cluster = settings.node_opt(&["be", "infra", "cluster"]);
        let backend = match cluster.and_then(|c| c.config_str("type")) {
            Some(kind) => kind.parse()?,
            None => BackendKind::Instance,
        };
        let cluster_name = cluster
            .and_then(|c| c.config_str("name"))
            .unwrap_or_else(|| "local".to_string());

        let dns = settings
            .node_opt(&["be", "infra", "dns"])
            .filter(|d| d.is_enabled())
            .map(|d| Value::Mapping(d.config.clone()));
        let (hostname, scheme) = match &dns {
            Some(config) => {
                let api = &config["endpoints"]["api"];
                let host = api["host"].as_str().unwrap_or("api");
                let root = config["root_domain"].as_str().unwrap_or("localhost");
                let sub = config["sub_domain"].as_str().unwrap_or("");
                (
                    hostname(host, &branch_suffix, sub, root),
                    api["scheme"].as_str().unwrap_or("https").to_string(),
                )
            }
            None => ("localhost".to_string(), "http".to_string()),
        };

        let version = read_version(settings.root())?;
        let image_tag = format!("{}-{}", version, vcs.sha);

        Ok(Self {
            compose_project_name: format!("{}_{}", stack_name, feature_set),
            namespace: format!("{}-{}", feature_set, stack_name),
            bucket_name: format!("{}-{}-{}", feature_set, stack_name, cluster_name),
            api_uri: format!("{}://{}", scheme, hostname),
            image_registry: settings.tree().config_str("image_registry"),
            sha: vcs.sha.clone(),
            stack_name,
            base_feature_set,
            feature_set,
            branch_suffix,
            cluster_name,
            hostname,
            version,
            image_tag,
            backend,
        })
    }
}

/// Feature set for a run: the sanitized branch when branch-derived naming is
/// on and the branch differs from the base feature set, else the base.
pub fn derive_feature_set(base: &str, from_branch: bool, branch: Option<&str>) -> String {
    match branch {
        Some(branch) if from_branch && !branch.is_empty() && branch != base => branch.to_string(),
        _ => base.to_string(),
    }
}

fn hostname(host: &str, suffix: &str, sub_domain: &str, root_domain: &str) -> String {
    if sub_domain.is_empty() {
        format!("{}{}.{}", host, suffix, root_domain)
    } else {
        format!("{}{}.{}.{}", host, suffix, sub_domain, root_domain)
    }
}

/// Version from the project's VERSION file, `0.0.0` when it is absent.
pub fn read_version(root: &Path) -> Result<Version> {
    let path = root.join(VERSION_FILE);
    if !path.is_file() {
        warn!("{} not found, using 0.0.0", path.display());
        return Ok(Version::new(0, 0, 0));
    }
    let text = fs::read_to_string(&path)?;
    Ok(Version::parse(text.trim().trim_start_matches('v'))?)
}
