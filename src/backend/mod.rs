//! # Deployment Backends
//!
//! Both backends expose the same lifecycle surface through [`Backend`]. The
//! variant is chosen once per run from the cluster type in the settings.
//!
//! Operations record per-service failures in the shared
//! [`ErrorReport`](crate::report::ErrorReport) and move on to the next
//! service. An `Err` return means the operation could not proceed at all
//! (for example regeneration failed); the caller records it under the verb.

pub mod instance;
pub mod kubernetes;
pub mod query;

use crate::context::Context;
use crate::error::Result;
use crate::naming::BackendKind;
use crate::report::ErrorReport;
use crate::runner::{CommandOutput, CommandRunner};

pub use instance::InstanceBackend;
pub use kubernetes::KubernetesBackend;

/// Options for [`Backend::up`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpOptions {
    /// Build images before starting.
    pub build: bool,
    /// Re-run database seeding even when already migrated.
    pub seed: bool,
    /// Skip presence checks and recreate namespaced resources.
    pub force: bool,
    /// Keep the service attached to the terminal.
    pub foreground: bool,
}

/// Options for [`Backend::logs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: bool,
    /// Narrow the pod lookup to one role (profile).
    pub role: Option<String>,
}

/// The lifecycle surface shared by every backend.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    fn build(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    /// Fetch the images of `services`, or of every service when empty.
    fn pull(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    /// Publish the built images of `services` to the image registry.
    fn push(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    fn up(&self, services: &[String], options: &UpOptions, report: &mut ErrorReport) -> Result<()>;

    fn stop(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    fn restart(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    /// Remove `services`, or the whole deployment when empty.
    fn down(&self, services: &[String], report: &mut ErrorReport) -> Result<()>;

    fn exec(&self, service: &str, command: &[String], report: &mut ErrorReport) -> Result<()>;

    fn logs(&self, service: &str, options: &LogOptions, report: &mut ErrorReport) -> Result<()>;

    fn ps(&self, report: &mut ErrorReport) -> Result<()>;
}

/// Build the backend selected by the settings.
pub fn create<'a>(ctx: &'a Context, runner: &'a dyn CommandRunner) -> Box<dyn Backend + 'a> {
    match ctx.naming.backend {
        BackendKind::Instance => Box::new(InstanceBackend::new(ctx, runner)),
        BackendKind::Kubernetes => Box::new(KubernetesBackend::new(ctx, runner)),
    }
}

/// Record a failed command under `attribute`, noting the service.
pub(crate) fn record(
    report: &mut ErrorReport,
    attribute: &str,
    service: Option<&str>,
    output: &CommandOutput,
) {
    match service {
        Some(service) => report.add_with_detail(attribute, output.failure_message(), service),
        None => report.add(attribute, output.failure_message()),
    }
}

/// Runs SIGINT-tolerant streaming commands such as log tails.
///
/// The handler is installed once per process; while a tail runs, ctrl-C
/// ends the child (which shares the terminal's process group) without
/// terminating stackctl, so the run still reaches its summary.
pub(crate) fn tolerate_interrupt() {
    use std::sync::Once;
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| log::debug!("interrupt received")) {
            log::warn!("could not install interrupt handler: {}", e);
        }
    });
}

/// Interrupted log tails end with a signal, which is not a failure.
pub(crate) fn interrupted(output: &CommandOutput) -> bool {
    !output.success && (output.code.is_none() || output.code == Some(130))
}
