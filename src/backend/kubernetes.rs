//! Kubernetes backend.
//!
//! Manifests are skaffold configs deployed into the namespace
//! `{feature_set}-{stack}`. Env files become secrets through
//! [`SecretSync`]. With an image registry configured, the local docker
//! credentials are installed as the `registry-*` pull secret. Cluster
//! operations require a kube-config; without one they are skipped and the
//! missing precondition is reported.

use std::fs;

use log::{debug, info, warn};

use super::{interrupted, query, record, tolerate_interrupt, Backend, LogOptions, UpOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::generator::{Family, Generator, ServiceDefinition};
use crate::naming::BackendKind;
use crate::report::ErrorReport;
use crate::runner::{CommandRunner, CommandSpec};
use crate::secret::SecretSync;

pub struct KubernetesBackend<'a> {
    ctx: &'a Context,
    runner: &'a dyn CommandRunner,
    generator: Generator<'a>,
}

impl<'a> KubernetesBackend<'a> {
    pub fn new(ctx: &'a Context, runner: &'a dyn CommandRunner) -> Self {
        Self {
            ctx,
            runner,
            generator: Generator::new(ctx),
        }
    }

    fn namespace(&self) -> &str {
        &self.ctx.naming.namespace
    }

    fn kube_env(&self) -> Vec<(String, String)> {
        vec![(
            "KUBECONFIG".to_string(),
            self.ctx.kubeconfig().display().to_string(),
        )]
    }

    fn with_env(mut spec: CommandSpec, env: Vec<(String, String)>) -> CommandSpec {
        for (k, v) in env {
            spec = spec.env(k, v);
        }
        spec
    }

    /// `kubectl` scoped to the namespace.
    fn kubectl(&self) -> CommandSpec {
        Self::with_env(
            CommandSpec::new("kubectl").args(["-n", self.namespace()]),
            self.kube_env(),
        )
    }

    fn skaffold(&self) -> CommandSpec {
        let mut env = self.kube_env();
        if let Some(registry) = &self.ctx.naming.image_registry {
            env.push(("SKAFFOLD_DEFAULT_REPO".to_string(), registry.clone()));
        }
        env.push(("IMAGE_TAG".to_string(), self.ctx.naming.image_tag.clone()));
        Self::with_env(
            CommandSpec::new("skaffold").args(["-n", self.namespace()]),
            env,
        )
    }

    /// Report and return `false` when the kube-config is missing.
    fn ready(&self, report: &mut ErrorReport) -> bool {
        let kubeconfig = self.ctx.kubeconfig();
        if kubeconfig.is_file() {
            return true;
        }
        println!("kubeconfig not found at {}", kubeconfig.display());
        let error = Error::PreconditionUnmet {
            message: format!("kubeconfig not found at {}", kubeconfig.display()),
        };
        report.add("kubeconfig", error.to_string());
        false
    }

    /// Create and label the namespace. Returns whether deployment may continue.
    fn ensure_namespace(&self, force: bool, report: &mut ErrorReport) -> Result<bool> {
        let ns = self.namespace().to_string();
        let existing = self.runner.run(
            &Self::with_env(CommandSpec::new("kubectl"), self.kube_env())
                .args(["get", "ns", ns.as_str()])
                .captured(),
        )?;
        if existing.success && !force {
            info!("namespace {} exists", ns);
            return Ok(true);
        }

        if !existing.success {
            let created = self.runner.run(
                &Self::with_env(CommandSpec::new("kubectl"), self.kube_env())
                    .args(["create", "ns", ns.as_str()]),
            )?;
            if !created.success {
                record(report, "namespace", Some(ns.as_str()), &created);
                return Ok(false);
            }
        }

        let labelled = self.runner.run(
            &Self::with_env(CommandSpec::new("kubectl"), self.kube_env()).args([
                "label",
                "namespace",
                ns.as_str(),
                "istio-injection=enabled",
                "--overwrite",
            ]),
        )?;
        if !labelled.success {
            record(report, "namespace", Some(ns.as_str()), &labelled);
        }

        let bundle = self.ctx.layout.deploy_path(Family::Platform).join("kubernetes");
        if bundle.is_dir() {
            let applied = self.runner.run(
                &self
                    .kubectl()
                    .args(["apply", "-f"])
                    .arg(bundle.display().to_string()),
            )?;
            if !applied.success {
                record(report, "namespace", Some(ns.as_str()), &applied);
            }
        }
        Ok(true)
    }

    /// Whether the component already has pods or a virtual service.
    fn present(&self, service: &str) -> Result<bool> {
        let selector = query::label_selector(service, None);
        let pods = self.runner.run(
            &self
                .kubectl()
                .args(["get", "pods", "-l", selector.as_str(), "-o", "json"])
                .captured(),
        )?;
        if pods.success && !query::parse_pods(&pods.stdout)?.is_empty() {
            return Ok(true);
        }
        let routes = self.runner.run(
            &self
                .kubectl()
                .args(["get", "virtualservices", "-l", selector.as_str(), "-o", "json"])
                .captured(),
        )?;
        Ok(routes.success && !query::parse_item_names(&routes.stdout)?.is_empty())
    }

    fn sync_secret(&self, name: &str, file: &std::path::Path, report: &mut ErrorReport) {
        let sync = SecretSync::new(self.runner, self.namespace()).with_env(self.kube_env());
        if let Err(e) = sync.sync(name, file) {
            report.add_with_detail("secret", e.to_string(), name);
        }
    }

    /// Install the docker credentials as the registry pull secret unless present.
    fn ensure_registry_secret(&self, report: &mut ErrorReport) -> Result<()> {
        let Some(registry) = self.ctx.naming.image_registry.as_deref() else {
            return Ok(());
        };
        let name = registry_secret_name(registry);
        let existing = self.runner.run(
            &self
                .kubectl()
                .args(["get", "secret", name.as_str()])
                .captured(),
        )?;
        if existing.success {
            debug!("registry secret {} exists", name);
            return Ok(());
        }
        let docker_config = self.ctx.docker_config();
        if !docker_config.is_file() {
            warn!(
                "no docker credentials at {}, skipping secret {}",
                docker_config.display(),
                name
            );
            return Ok(());
        }
        let created = self.runner.run(
            &self
                .kubectl()
                .args(["create", "secret", "generic", name.as_str()])
                .arg(format!(
                    "--from-file=.dockerconfigjson={}",
                    docker_config.display()
                ))
                .arg("--type=kubernetes.io/dockerconfigjson"),
        )?;
        if !created.success {
            record(report, "secret", Some(name.as_str()), &created);
        }
        Ok(())
    }

    fn passes(def: &ServiceDefinition<'_>) -> Vec<Option<String>> {
        let profiles = def.profiles();
        if profiles.is_empty() {
            vec![None]
        } else {
            profiles.into_iter().map(Some).collect()
        }
    }

    fn deploy(&self, def: &ServiceDefinition<'_>, options: &UpOptions, report: &mut ErrorReport) -> Result<()> {
        if def.has_environment() {
            self.sync_secret(def.name(), &def.env_file(), report);
        }
        let verb = if options.build { "run" } else { "deploy" };
        for profile in Self::passes(def) {
            let mut spec = self
                .skaffold()
                .args([verb, "-f"])
                .arg(def.manifest().display().to_string());
            if let Some(profile) = &profile {
                spec = spec.args(["-p", profile.as_str()]);
            }
            let output = self.runner.run(&spec)?;
            if !output.success {
                record(report, "up", Some(def.name()), &output);
                return Ok(());
            }
            // a pass may reset the replica count of the shared deployment
            if def.family == Family::Platform {
                self.scale(def.name(), def.replicas(), "up", report)?;
            }
        }
        Ok(())
    }

    fn scale(&self, service: &str, replicas: u64, attribute: &str, report: &mut ErrorReport) -> Result<()> {
        let output = self.runner.run(
            &self
                .kubectl()
                .args(["scale", "deployment", "-l"])
                .arg(query::label_selector(service, None))
                .arg(format!("--replicas={}", replicas)),
        )?;
        if !output.success {
            record(report, attribute, Some(service), &output);
        }
        Ok(())
    }

    /// First running pod of the component.
    pub fn pod(&self, service: &str, role: Option<&str>) -> Result<Option<String>> {
        let output = self.runner.run(
            &self
                .kubectl()
                .args(["get", "pods", "-l"])
                .arg(query::label_selector(service, role))
                .args(["-o", "json"])
                .captured(),
        )?;
        if !output.success {
            return Ok(None);
        }
        let pods = query::parse_pods(&output.stdout)?;
        Ok(query::first_running(&pods).map(|p| p.name.clone()))
    }

    fn platform_definitions(&self, services: &[String], attribute: &str, report: &mut ErrorReport) -> Vec<ServiceDefinition<'a>> {
        let mut defs = Vec::new();
        for service in services {
            match self
                .generator
                .service(Family::Platform, service)
                .or_else(|| self.generator.service(Family::Services, service))
            {
                Some(def) => defs.push(def),
                None => report.add_with_detail(attribute, "no such service", service.as_str()),
            }
        }
        defs
    }
}

impl Backend for KubernetesBackend<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Kubernetes
    }

    fn build(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.generator.refresh()?;
        for def in self.platform_definitions(services, "build", report) {
            let output = self.runner.run(
                &self
                    .skaffold()
                    .args(["build", "-f"])
                    .arg(def.manifest().display().to_string()),
            )?;
            if !output.success {
                record(report, "build", Some(def.name()), &output);
            }
        }
        Ok(())
    }

    fn pull(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.generator.refresh()?;
        let defs = if services.is_empty() {
            let mut all = self.generator.services(Family::Services);
            all.extend(self.generator.services(Family::Platform));
            all
        } else {
            self.platform_definitions(services, "pull", report)
        };
        for def in defs {
            let image = def.image();
            let output = self
                .runner
                .run(&CommandSpec::new("docker").args(["pull", image.as_str()]))?;
            if !output.success {
                record(report, "pull", Some(def.name()), &output);
            }
        }
        Ok(())
    }

    fn push(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        self.generator.refresh()?;
        for def in self.platform_definitions(services, "push", report) {
            let output = self.runner.run(
                &self
                    .skaffold()
                    .args(["build", "--push", "-f"])
                    .arg(def.manifest().display().to_string()),
            )?;
            if !output.success {
                record(report, "push", Some(def.name()), &output);
            }
        }
        Ok(())
    }

    fn up(&self, services: &[String], options: &UpOptions, report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        self.generator.refresh()?;
        if !self.ensure_namespace(options.force, report)? {
            return Ok(());
        }

        for family in [Family::Services, Family::Platform] {
            let file = self.ctx.layout.deploy_path(family).join(family.env_file_name());
            if file.is_file() {
                self.sync_secret(family.slug(), &file, report);
            }
        }

        self.ensure_registry_secret(report)?;

        for def in self.generator.services(Family::Services) {
            if options.force || !self.present(def.name())? {
                self.deploy(&def, options, report)?;
            }
        }
        for def in self.platform_definitions(services, "up", report) {
            if def.family == Family::Services {
                continue;
            }
            if options.force || !self.present(def.name())? {
                self.deploy(&def, options, report)?;
            } else {
                info!("{} already deployed", def.name());
            }
        }

        println!("API endpoint: {}", self.ctx.naming.api_uri);
        Ok(())
    }

    fn stop(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        for service in services {
            self.scale(service, 0, "stop", report)?;
        }
        Ok(())
    }

    fn restart(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        self.generator.refresh()?;
        for service in services {
            let output = self.runner.run(
                &self
                    .kubectl()
                    .args(["rollout", "restart", "deployment", "-l"])
                    .arg(query::label_selector(service, None)),
            )?;
            if !output.success {
                record(report, "restart", Some(service.as_str()), &output);
            }
        }
        Ok(())
    }

    fn down(&self, services: &[String], report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        if services.is_empty() {
            let output = self.runner.run(
                &Self::with_env(CommandSpec::new("kubectl"), self.kube_env())
                    .args(["delete", "ns", self.namespace()]),
            )?;
            if !output.success {
                record(report, "down", None, &output);
            }
            let layout = &self.ctx.layout;
            for dir in [layout.credentials_dir(), layout.services_cache_dir()] {
                if dir.exists() {
                    fs::remove_dir_all(dir)?;
                }
            }
            return Ok(());
        }

        self.generator.refresh()?;
        for def in self.platform_definitions(services, "down", report) {
            for profile in Self::passes(&def) {
                let mut spec = self
                    .skaffold()
                    .args(["delete", "-f"])
                    .arg(def.manifest().display().to_string());
                if let Some(profile) = &profile {
                    spec = spec.args(["-p", profile.as_str()]);
                }
                let output = self.runner.run(&spec)?;
                if !output.success {
                    record(report, "down", Some(def.name()), &output);
                }
            }
        }
        Ok(())
    }

    fn exec(&self, service: &str, command: &[String], report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        let Some(pod) = self.pod(service, None)? else {
            report.add_with_detail("exec", "no running pod", service);
            return Ok(());
        };
        let output = self.runner.run(
            &self
                .kubectl()
                .args(["exec", "-it", pod.as_str(), "-c", service, "--"])
                .args(command.iter().cloned())
                .live(),
        )?;
        if !output.success {
            record(report, "exec", Some(service), &output);
        }
        Ok(())
    }

    fn logs(&self, service: &str, options: &LogOptions, report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        let Some(pod) = self.pod(service, options.role.as_deref())? else {
            report.add_with_detail("logs", "no running pod", service);
            return Ok(());
        };
        let mut spec = self.kubectl().arg("logs");
        if options.follow {
            tolerate_interrupt();
            spec = spec.arg("-f");
        }
        let output = self
            .runner
            .run(&spec.args([pod.as_str(), "-c", service]).live())?;
        if !output.success && !(options.follow && interrupted(&output)) {
            record(report, "logs", Some(service), &output);
        }
        Ok(())
    }

    fn ps(&self, report: &mut ErrorReport) -> Result<()> {
        if !self.ready(report) {
            return Ok(());
        }
        let output = self.runner.run(&self.kubectl().args(["get", "pods"]).live())?;
        if !output.success {
            record(report, "ps", None, &output);
        }
        Ok(())
    }
}

/// Name of the pull secret for `registry`, reduced to DNS-safe characters.
pub fn registry_secret_name(registry: &str) -> String {
    let safe: String = registry
        .trim_end_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("registry-{}", safe)
}
