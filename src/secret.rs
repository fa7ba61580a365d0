//! Cluster secrets from local env files.
//!
//! A secret is replaced only when its decoded contents differ from the env
//! file: delete, then create from the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::envfile::EnvMap;
use crate::error::{Error, Result};
use crate::runner::{CommandRunner, CommandSpec};

pub use crate::envfile::parse_env_file;

#[derive(Debug, Deserialize)]
struct SecretDocument {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Decode the `.data` of `kubectl get secret -o json`.
pub fn decode_secret(json: &str) -> Result<EnvMap> {
    let doc: SecretDocument = serde_json::from_str(json)?;
    let mut env = EnvMap::new();
    for (key, encoded) in doc.data {
        let bytes = STANDARD.decode(encoded.trim())?;
        env.insert(key, String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(env)
}

/// `true` when the key/value sets differ.
pub fn needs_update(local: &EnvMap, remote: &EnvMap) -> bool {
    !local.same_entries(remote)
}

/// What [`SecretSync::sync`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// Keeps named secrets in one namespace equal to local env files.
pub struct SecretSync<'a> {
    runner: &'a dyn CommandRunner,
    namespace: String,
    env: Vec<(String, String)>,
}

impl<'a> SecretSync<'a> {
    pub fn new(runner: &'a dyn CommandRunner, namespace: &str) -> Self {
        Self {
            runner,
            namespace: namespace.to_string(),
            env: Vec::new(),
        }
    }

    /// Environment passed to every `kubectl` call, e.g. `KUBECONFIG`.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    fn kubectl(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("kubectl").args(["-n", self.namespace.as_str()]);
        for (k, v) in &self.env {
            spec = spec.env(k.clone(), v.clone());
        }
        spec
    }

    pub fn sync(&self, name: &str, file: &Path) -> Result<SyncOutcome> {
        let local = parse_env_file(&fs::read_to_string(file)?);

        let current = self.runner.run(
            &self
                .kubectl()
                .args(["get", "secret", name, "-o", "json"])
                .captured(),
        )?;
        let exists = current.success && !current.stdout.trim().is_empty();
        if exists && !needs_update(&local, &decode_secret(&current.stdout)?) {
            log::debug!("secret {} is current", name);
            return Ok(SyncOutcome::Unchanged);
        }

        if exists {
            let deleted = self.runner.run(&self.kubectl().args(["delete", "secret", name]))?;
            if !deleted.success {
                return Err(Error::ExternalCommand {
                    command: format!("kubectl delete secret {}", name),
                    stderr: deleted.failure_message(),
                });
            }
        }
        let created = self.runner.run(
            &self
                .kubectl()
                .args(["create", "secret", "generic", name])
                .arg(format!("--from-env-file={}", file.display())),
        )?;
        if !created.success {
            return Err(Error::ExternalCommand {
                command: format!("kubectl create secret generic {}", name),
                stderr: created.failure_message(),
            });
        }
        log::info!("secret {} {}", name, if exists { "replaced" } else { "created" });
        Ok(if exists {
            SyncOutcome::Replaced
        } else {
            SyncOutcome::Created
        })
    }
}
