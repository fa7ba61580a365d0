//! Project discovery and layered file loading.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use super::merge::merge_values;
use crate::error::{Error, Result};

/// Marker file identifying a project root, relative to that root.
pub const BASE_FILE: &str = "config/deployment.yml";

/// Walk upward from `start` until a directory containing [`BASE_FILE`] is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };
    start
        .ancestors()
        .find(|dir| dir.join(BASE_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Config {
            message: format!("no {} found in {} or any parent", BASE_FILE, start.display()),
            hint: Some("run from inside a project or create config/deployment.yml".to_string()),
        })
}

/// A settings source file and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub path: PathBuf,
    pub required: bool,
}

/// Layers in precedence order, lowest first.
pub fn layers(root: &Path, env: &str, profile: Option<&str>) -> Vec<Layer> {
    let environments = root.join("config").join("environments");
    let mut layers = vec![
        Layer {
            path: root.join(BASE_FILE),
            required: true,
        },
        Layer {
            path: environments.join(format!("{}.yml", env)),
            required: false,
        },
    ];
    if let Some(profile) = profile.filter(|p| !p.is_empty()) {
        layers.push(Layer {
            path: environments.join(format!("{}-{}.yml", env, profile)),
            required: false,
        });
    }
    layers
}

/// Read and deep merge every layer.
pub fn load_layers(layers: &[Layer]) -> Result<Value> {
    let mut merged = Value::Mapping(Mapping::new());
    for layer in layers {
        if !layer.path.is_file() {
            if layer.required {
                return Err(Error::config(format!(
                    "required settings file missing: {}",
                    layer.path.display()
                )));
            }
            warn!("settings file not found, skipping: {}", layer.path.display());
            continue;
        }
        debug!("loading settings layer {}", layer.path.display());
        let value = read_yaml(&layer.path)?;
        merge_values(&mut merged, &value, "");
    }
    Ok(merged)
}

fn read_yaml(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    serde_yaml::from_str(&text).map_err(|e| Error::Config {
        message: format!("{}: {}", path.display(), e),
        hint: None,
    })
}
