//! Filesystem locations of generated artifacts and runtime state.
//!
//! ```text
//! {root}/tmp/deployments/{env}/{family}/{feature_set}/   regenerated manifests
//! {root}/tmp/deployments/{env}/infra/                    terraform working dir
//! {root}/tmp/runtime/{env}/{feature_set}/                compose.env, sentinels, caches
//! {root}/templates/{compose|skaffold}/{type}.yml         project template overrides
//! {root}/devops/{helm-charts,kubernetes,terraform}/      static bundles
//! ```

use std::path::{Path, PathBuf};

use crate::generator::Family;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    env: String,
    feature_set: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, env: &str, feature_set: &str) -> Self {
        Self {
            root: root.into(),
            env: env.to_string(),
            feature_set: feature_set.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn deploy_root(&self) -> PathBuf {
        self.root.join("tmp").join("deployments").join(&self.env)
    }

    /// Directory owned by one family; deleted and rewritten on regeneration.
    pub fn deploy_path(&self, family: Family) -> PathBuf {
        self.deploy_root().join(family.slug()).join(&self.feature_set)
    }

    pub fn infra_dir(&self) -> PathBuf {
        self.deploy_root().join("infra")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root
            .join("tmp")
            .join("runtime")
            .join(&self.env)
            .join(&self.feature_set)
    }

    /// Version of stackctl that generated the current artifacts.
    pub fn generator_stamp(&self) -> PathBuf {
        self.runtime_dir().join("generator.version")
    }

    pub fn compose_env(&self) -> PathBuf {
        self.runtime_dir().join("compose.env")
    }

    /// Sentinel recording a completed database migration for `service`.
    pub fn migrated_sentinel(&self, service: &str) -> PathBuf {
        self.runtime_dir().join(format!("{}-migrated", service))
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.runtime_dir().join("platform")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.credentials_dir().join("credentials.json")
    }

    pub fn services_cache_dir(&self) -> PathBuf {
        self.runtime_dir().join("services")
    }

    pub fn proxy_dir(&self) -> PathBuf {
        self.runtime_dir().join("proxy")
    }

    pub fn proxy_config(&self) -> PathBuf {
        self.proxy_dir().join("default.conf")
    }

    /// `.env` link read by compose from the project root.
    pub fn dotenv_link(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn devops_dir(&self) -> PathBuf {
        self.root.join("devops")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = Layout::new("/p", "test", "ci");
        assert_eq!(
            layout.deploy_path(Family::Platform),
            PathBuf::from("/p/tmp/deployments/test/platform/ci")
        );
        assert_eq!(
            layout.deploy_path(Family::ClusterServices),
            PathBuf::from("/p/tmp/deployments/test/cluster/ci")
        );
        assert_eq!(
            layout.compose_env(),
            PathBuf::from("/p/tmp/runtime/test/ci/compose.env")
        );
        assert_eq!(
            layout.migrated_sentinel("core"),
            PathBuf::from("/p/tmp/runtime/test/ci/core-migrated")
        );
        assert_eq!(
            layout.credentials_file(),
            PathBuf::from("/p/tmp/runtime/test/ci/platform/credentials.json")
        );
    }
}
