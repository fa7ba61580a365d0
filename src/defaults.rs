//! Default locations used when settings leave them out.

use std::path::PathBuf;

/// Returns the default kube-config location.
///
/// `~/.kube/config`, falling back to `.kube/config` in the current directory
/// if the home directory cannot be determined.
pub fn default_kubeconfig() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kube")
        .join("config")
}

/// Returns the default docker client config, `~/.docker/config.json`.
pub fn default_docker_config() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docker")
        .join("config.json")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
