//! Compose backend.
//!
//! Every operation first regenerates stale artifacts and points the
//! project's `.env` at the generated `compose.env`, which carries the
//! compose file list and project name.

use std::fs;

use log::{debug, info};

use super::{interrupted, query, record, tolerate_interrupt, Backend, LogOptions, UpOptions};
use crate::context::Context;
use crate::error::Result;
use crate::generator::{Family, Generator};
use crate::naming::BackendKind;
use crate::report::ErrorReport;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Seeding task run in a fresh container when a service has not been migrated.
pub const DEFAULT_MIGRATE_TASK: &str = "db:reset:seed";

pub struct InstanceBackend<'a> {
    ctx: &'a Context,
    runner: &'a dyn CommandRunner,
    generator: Generator<'a>,
}

impl<'a> InstanceBackend<'a> {
    pub fn new(ctx: &'a Context, runner: &'a dyn CommandRunner) -> Self {
        Self {
            ctx,
            runner,
            generator: Generator::new(ctx),
        }
    }

    fn compose(&self) -> CommandSpec {
        CommandSpec::from_parts(&self.ctx.compose_command()).cwd(self.ctx.layout.root())
    }

    fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        self.runner.run(&spec)
    }

    /// Regenerate when stale and relink `.env`.
    fn prepare(&self) -> Result<()> {
        self.generator.refresh()?;
        self.link_env()
    }

    fn link_env(&self) -> Result<()> {
        let link = self.ctx.layout.dotenv_link();
        let target = self.ctx.layout.compose_env();
        if link.symlink_metadata().is_ok() {
            fs::remove_file(&link)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link)?;
        #[cfg(not(unix))]
        fs::copy(&target, &link)?;
        Ok(())
    }

    /// Components with a running container in this stack and feature set.
    pub fn running(&self, service: Option<&str>) -> Result<Vec<String>> {
        let naming = &self.ctx.naming;
        let output = self.runner.run(&query::container_query(
            &naming.stack_name,
            &naming.feature_set,
            service,
        ))?;
        if !output.success {
            log::warn!("container query failed: {}", output.failure_message());
            return Ok(Vec::new());
        }
        Ok(query::parse_container_names(&output.stdout))
    }

    fn migrate_command(&self, service: &str) -> Vec<String> {
        let node = self
            .ctx
            .platform_node()
            .and_then(|p| p.component(service));
        if let Some(command) = node.and_then(|n| n.config_str("migrate_command")) {
            return command.split_whitespace().map(str::to_string).collect();
        }
        let engine = node.is_some_and(|n| n.config_bool("engine", false));
        let task = if engine {
            format!("app:{}", DEFAULT_MIGRATE_TASK)
        } else {
            DEFAULT_MIGRATE_TASK.to_string()
        };
        vec!["rails".to_string(), task]
    }

    /// Seed the database once per feature set. Returns whether the service may start.
    pub fn database_check(
        &self,
        service: &str,
        seed: bool,
        report: &mut ErrorReport,
    ) -> Result<bool> {
        let sentinel = self.ctx.layout.migrated_sentinel(service);
        if sentinel.exists() && !seed {
            debug!("{} already migrated", service);
            return Ok(true);
        }
        if sentinel.exists() {
            fs::remove_file(&sentinel)?;
        }

        info!("migrating database for {}", service);
        let output = self.run(
            self.compose()
                .args(["run", "--rm", service])
                .args(self.migrate_command(service)),
        )?;
        if !output.success {
            report.add_with_detail("database_check", output.failure_message(), service);
            return Ok(false);
        }
        if !self.runner.dry_run() {
            crate::generator::write_file(&sentinel, "")?;
        }
        if service == self.ctx.identity_service() {
            self.remove_credentials()?;
        }
        Ok(true)
    }

    fn remove_credentials(&self) -> Result<()> {
        let dir = self.ctx.layout.credentials_dir();
        if dir.exists() {
            debug!("removing credentials cache {}", dir.display());
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn remove_runtime_caches(&self) -> Result<()> {
        self.remove_credentials()?;
        let layout = &self.ctx.layout;
        for dir in [layout.services_cache_dir(), layout.proxy_dir()] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Rewrite the proxy locations from the running platform services and bounce the proxy.
    pub fn reload_proxy(&self, report: &mut ErrorReport) -> Result<()> {
        let running: Vec<String> = self
            .running(None)?
            .into_iter()
            .filter(|s| self.ctx.is_platform_service(s))
            .collect();
        self.generator.write_proxy_config(&running)?;

        let proxy = self.ctx.proxy_service();
        let stop = self.run(self.compose().args(["stop", proxy.as_str()]))?;
        if !stop.success {
            record(report, "proxy", Some(proxy.as_str()), &stop);
            return Ok(());
        }
        let up = self.run(self.compose().args(["up", "-d", proxy.as_str()]))?;
        if !up.success {
            record(report, "proxy", Some(proxy.as_str()), &up);
        }
        Ok(())
    }

    /// Copy the identity service's credentials into the runtime cache.
    pub fn credentials(&self, report: &mut ErrorReport) -> Result<Option<String>> {
        self.prepare()?;
        let identity = self.ctx.identity_service();
        let source = self
            .ctx
            .platform_node()
            .and_then(|p| p.component(&identity))
            .and_then(|n| n.config_str("credentials_path"))
            .unwrap_or_else(|| {
                format!(
                    "/home/rails/services/app/tmp/{}/credentials.json",
                    self.ctx.naming.feature_set
                )
            });
        let dest = self.ctx.layout.credentials_file();
        fs::create_dir_all(self.ctx.layout.credentials_dir())?;

        let output = self.run(
            self.compose()
                .arg("cp")
                .arg(format!("{}:{}", identity, source))
                .arg(dest.display().to_string()),
        )?;
        if !output.success {
            report.add("get_credentials", format!("file not found: {}", source));
            return Ok(None);
        }
        Ok(fs::read_to_string(&dest).ok())
    }
}

impl Backend for InstanceBackend<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Instance
    }

    fn build(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let output = self.run(
            self.compose()
                .args(["build", "--parallel"])
                .args(services.iter().cloned()),
        )?;
        if !output.success {
            record(report, "build", None, &output);
        }
        Ok(())
    }

    fn pull(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let output = self.run(self.compose().arg("pull").args(services.iter().cloned()))?;
        if !output.success {
            record(report, "pull", None, &output);
        }
        Ok(())
    }

    fn push(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let output = self.run(self.compose().arg("push").args(services.iter().cloned()))?;
        if !output.success {
            record(report, "push", None, &output);
        }
        Ok(())
    }

    fn up(&self, services: &[String], options: &UpOptions, report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let mut platform_target = false;

        for service in services {
            if options.build {
                let built = self.run(self.compose().args(["build", "--parallel", service.as_str()]))?;
                if !built.success {
                    record(report, "build", Some(service.as_str()), &built);
                    continue;
                }
            }

            if self.ctx.is_platform_service(service) {
                platform_target = true;
                let basic = self
                    .generator
                    .service(Family::Platform, service)
                    .is_some_and(|d| d.is_basic());
                if !basic && !self.database_check(service, options.seed, report)? {
                    continue;
                }
            }

            let mut spec = self.compose().arg("up");
            spec = if options.foreground {
                spec.live()
            } else {
                spec.arg("-d")
            };
            let output = self.run(spec.arg(service.as_str()))?;
            if !output.success {
                record(report, "up", Some(service.as_str()), &output);
            }
        }

        if platform_target && self.ctx.proxy_enabled() {
            self.reload_proxy(report)?;
        }
        Ok(())
    }

    fn stop(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let output = self.run(self.compose().arg("stop").args(services.iter().cloned()))?;
        if !output.success {
            record(report, "stop", None, &output);
        }
        Ok(())
    }

    fn restart(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let stopped = self.run(self.compose().arg("stop").args(services.iter().cloned()))?;
        if !stopped.success {
            record(report, "restart", None, &stopped);
            return Ok(());
        }
        let started = self.run(self.compose().args(["up", "-d"]).args(services.iter().cloned()))?;
        if !started.success {
            record(report, "restart", None, &started);
        }
        Ok(())
    }

    fn down(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        if services.is_empty() {
            let output = self.run(self.compose().arg("down"))?;
            if !output.success {
                record(report, "down", None, &output);
            }
            return self.remove_runtime_caches();
        }

        let stopped = self.run(self.compose().arg("stop").args(services.iter().cloned()))?;
        if !stopped.success {
            record(report, "down", None, &stopped);
        }
        let removed = self.run(self.compose().args(["rm", "-f"]).args(services.iter().cloned()))?;
        if !removed.success {
            record(report, "down", None, &removed);
        }
        if services.contains(&self.ctx.identity_service()) {
            self.remove_credentials()?;
        }
        Ok(())
    }

    fn exec(&self, service: &str, command: &[String], report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let attached = self.running(Some(service))?.iter().any(|s| s == service);
        let spec = if attached {
            self.compose().args(["exec", service])
        } else {
            self.compose().args(["run", "--rm", service])
        };
        let output = self.run(spec.args(command.iter().cloned()).live())?;
        if !output.success {
            record(report, "exec", Some(service), &output);
        }
        Ok(())
    }

    fn logs(&self, service: &str, options: &LogOptions, report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let mut spec = self.compose().arg("logs");
        if options.follow {
            tolerate_interrupt();
            spec = spec.arg("-f");
        }
        let output = self.run(spec.arg(service).live())?;
        if !output.success && !(options.follow && interrupted(&output)) {
            record(report, "logs", Some(service), &output);
        }
        Ok(())
    }

    fn ps(&self, report: &mut ErrorReport) -> Result<()> {
        self.prepare()?;
        let output = self.run(self.compose().arg("ps").live())?;
        if !output.success {
            record(report, "ps", None, &output);
        }
        Ok(())
    }
}
