//! # Orchestrator
//!
//! Resolves the target services of a lifecycle verb, dispatches it to the
//! active backend and collects every failure in one [`ErrorReport`].
//!
//! ```no_run
//! use stackctl::context::Context;
//! use stackctl::orchestrator::{Orchestrator, Verb};
//! use stackctl::runner::SystemRunner;
//! use stackctl::settings::LoadOptions;
//!
//! let ctx = Context::load(&LoadOptions::new(".", "development"))?;
//! let runner = SystemRunner::default();
//! let report = Orchestrator::new(&ctx, &runner).run(&Verb::Ps, &[]);
//! std::process::exit(report.exit_code());
//! # Ok::<(), stackctl::error::Error>(())
//! ```

use log::debug;

use crate::backend::{self, Backend, LogOptions, UpOptions};
use crate::context::Context;
use crate::report::ErrorReport;
use crate::runner::CommandRunner;

/// Report attribute for service names that are not enabled components.
pub const UNKNOWN_SERVICE: &str = "unknown_service";

/// A lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Build,
    Pull,
    Push,
    Up(UpOptions),
    Stop,
    Restart,
    Down,
    Exec { service: String, command: Vec<String> },
    Logs { service: String, options: LogOptions },
    Ps,
}

impl Verb {
    /// Report attribute for failures that abort the whole verb.
    pub fn attribute(&self) -> &'static str {
        match self {
            Verb::Build => "build",
            Verb::Pull => "pull",
            Verb::Push => "push",
            Verb::Up(_) => "up",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Down => "down",
            Verb::Exec { .. } => "exec",
            Verb::Logs { .. } => "logs",
            Verb::Ps => "ps",
        }
    }

    /// Whether an empty service list means the enabled platform services.
    /// `down` with no names removes everything instead, and `pull` fetches
    /// every image.
    fn expands_defaults(&self) -> bool {
        matches!(
            self,
            Verb::Build | Verb::Push | Verb::Up(_) | Verb::Stop | Verb::Restart
        )
    }
}

pub struct Orchestrator<'a> {
    ctx: &'a Context,
    backend: Box<dyn Backend + 'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a Context, runner: &'a dyn CommandRunner) -> Self {
        Self {
            ctx,
            backend: backend::create(ctx, runner),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Validate `explicit` names, or default to the enabled platform services.
    ///
    /// Names are de-duplicated in first-seen order. Unknown and disabled
    /// names are recorded and dropped.
    pub fn resolve_services(&self, explicit: &[String], report: &mut ErrorReport) -> Vec<String> {
        if explicit.is_empty() {
            return self.ctx.platform_services();
        }
        let known = self.ctx.application_services();
        let mut resolved: Vec<String> = Vec::new();
        for name in explicit {
            if resolved.contains(name) {
                continue;
            }
            if self.ctx.is_platform_service(name) || known.contains(name) {
                resolved.push(name.clone());
            } else {
                report.add_with_detail(UNKNOWN_SERVICE, "not an enabled service", name.as_str());
            }
        }
        resolved
    }

    /// Run `verb` against `services` and return everything that failed.
    pub fn run(&self, verb: &Verb, services: &[String]) -> ErrorReport {
        let mut report = ErrorReport::new();
        let targets = if services.is_empty() && !verb.expands_defaults() {
            Vec::new()
        } else {
            self.resolve_services(services, &mut report)
        };
        debug!("{} targets: {:?}", verb.attribute(), targets);
        if !services.is_empty() && targets.is_empty() {
            return report;
        }

        let backend = self.backend.as_ref();
        let result = match verb {
            Verb::Build => backend.build(&targets, &mut report),
            Verb::Pull => backend.pull(&targets, &mut report),
            Verb::Push => backend.push(&targets, &mut report),
            Verb::Up(options) => backend.up(&targets, options, &mut report),
            Verb::Stop => backend.stop(&targets, &mut report),
            Verb::Restart => backend.restart(&targets, &mut report),
            Verb::Down => backend.down(&targets, &mut report),
            Verb::Exec { service, command } => backend.exec(service, command, &mut report),
            Verb::Logs { service, options } => backend.logs(service, options, &mut report),
            Verb::Ps => backend.ps(&mut report),
        };
        if let Err(e) = result {
            report.add(verb.attribute(), e.to_string());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context_at, PROJECT};
    use crate::runner::{CommandOutput, ScriptedRunner};
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_defaults_to_enabled_platform() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new();
        let orchestrator = Orchestrator::new(&ctx, &runner);
        let mut report = ErrorReport::new();

        let first = orchestrator.resolve_services(&[], &mut report);
        let second = orchestrator.resolve_services(&[], &mut report);
        assert_eq!(first, vec!["iam", "core"]);
        assert_eq!(first, second);
        assert!(report.is_empty());
    }

    #[test]
    fn test_resolve_dedups_and_drops_unknown() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new();
        let orchestrator = Orchestrator::new(&ctx, &runner);
        let mut report = ErrorReport::new();

        let resolved = orchestrator.resolve_services(
            &names(&["core", "nginx", "core", "billing", "nope"]),
            &mut report,
        );
        assert_eq!(resolved, vec!["core", "nginx"]);
        let entry = report.get(UNKNOWN_SERVICE).unwrap();
        assert_eq!(entry.details, vec!["billing", "nope"]);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_up_end_to_end() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new().on("docker ps", CommandOutput::ok("iam\ncore\nnginx\n"));
        let report = Orchestrator::new(&ctx, &runner).run(&Verb::Up(UpOptions::default()), &[]);
        assert!(report.is_empty(), "{:?}", report);

        let platform = ctx.layout.deploy_path(crate::generator::Family::Platform);
        assert!(platform.join("iam.yml").is_file());
        assert!(platform.join("core.yml").is_file());
        assert!(platform.join("platform.env").is_file());

        assert!(!ctx.layout.migrated_sentinel("iam").exists());
        assert!(ctx.layout.migrated_sentinel("core").exists());
        assert!(runner.called("docker compose run --rm core"));
        assert!(runner.called("docker compose up -d iam"));
        assert!(runner.called("docker compose up -d core"));
        let stop = runner.position("docker compose stop nginx").unwrap();
        let start = runner.position("docker compose up -d nginx").unwrap();
        assert!(stop < start);
    }

    #[test]
    fn test_failures_count_toward_exit_code() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new()
            .on("build", CommandOutput::failed(1, "no such image"))
            .on("stop core", CommandOutput::failed(1, ""));
        let orchestrator = Orchestrator::new(&ctx, &runner);

        let report = orchestrator.run(&Verb::Build, &[]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.get("build").unwrap().message, "no such image");

        let report = orchestrator.run(&Verb::Stop, &names(&["core", "ghost"]));
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.get("stop").unwrap().message, "see terminal output");
    }

    #[test]
    fn test_only_unknown_names_run_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new();
        let report = Orchestrator::new(&ctx, &runner).run(&Verb::Stop, &names(&["ghost"]));
        assert_eq!(report.exit_code(), 1);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_pull_and_push_targets() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new().on("push", CommandOutput::failed(1, "denied"));
        let orchestrator = Orchestrator::new(&ctx, &runner);

        let report = orchestrator.run(&Verb::Pull, &[]);
        assert!(report.is_empty());
        assert!(runner.calls().contains(&"docker compose pull".to_string()));

        let report = orchestrator.run(&Verb::Push, &[]);
        assert!(runner.called("docker compose push iam core"));
        assert_eq!(report.get("push").unwrap().message, "denied");
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_down_without_names_is_not_expanded() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), PROJECT);
        let runner = ScriptedRunner::new();
        let report = Orchestrator::new(&ctx, &runner).run(&Verb::Down, &[]);
        assert!(report.is_empty());
        assert_eq!(runner.calls(), vec!["docker compose down"]);
    }
}
