//! # stackctl
//!
//! Library behind the `stackctl` command-line tool. It resolves a project's
//! layered deployment settings, derives the names of everything a deployment
//! creates, generates compose or skaffold manifests for each component and
//! drives the lifecycle of the stack through one uniform set of verbs.
//!
//! ## Quick Example
//!
//! ```
//! use stackctl::settings::Settings;
//!
//! let doc = serde_yaml::from_str(r#"
//! config:
//!   name: acme
//! components:
//!   be:
//!     components:
//!       application:
//!         config:
//!           feature_set: ci
//! "#).unwrap();
//! let settings = Settings::from_value("/srv/acme", "test", None, doc).unwrap();
//! assert_eq!(settings.stack_name().unwrap(), "acme");
//! assert!(settings.get("components.be.components.nope").is_err());
//! ```
//!
//! ## Core Concepts
//!
//! - **Settings (`settings`)**: `config/deployment.yml` merged with the
//!   environment and profile overlays and `STACK__*` variables into an
//!   immutable tree of components.
//! - **Naming (`naming`, `git`)**: stack name, feature set, compose project,
//!   namespace, hostname and image tag for one run.
//! - **Generation (`generator`)**: per-family manifests and env files under
//!   `tmp/deployments`, regenerated when settings or templates change.
//! - **Backends (`backend`)**: compose (`Instance`) or Kubernetes, both
//!   behind the [`backend::Backend`] trait.
//! - **Secrets (`secret`)**: cluster secrets kept equal to generated env files.
//! - **Orchestration (`orchestrator`, `report`)**: verb dispatch and the
//!   error report whose size is the process exit status.
//!
//! ## Execution Flow
//!
//! 1.  **Settings**: load and merge the layers, apply variable overrides.
//! 2.  **Context**: resolve naming and filesystem layout.
//! 3.  **Services**: validate the named services or default to the enabled
//!     platform services.
//! 4.  **Backend**: regenerate stale manifests and run the external tools.
//! 5.  **Report**: print one line per failed step and exit with their count.

pub mod backend;
pub mod context;
pub mod defaults;
pub mod envfile;
pub mod error;
pub mod generator;
pub mod git;
pub mod infra;
pub mod layout;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod report;
pub mod runner;
pub mod secret;
pub mod settings;

#[cfg(test)]
mod naming_proptest;
