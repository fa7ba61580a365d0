//! # Infrastructure Provisioning
//!
//! Terraform runs in `{root}/tmp/deployments/{env}/infra`. The directory
//! holds a generated `state.tf.json` (the state backend from
//! `config.terraform.state`) next to a verbatim copy of
//! `{root}/devops/terraform`. `apply` records `terraform output -json` in
//! `output.json`, which `show` reads back.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use serde_json::{json, Map, Value};

use crate::backend::record;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::generator::{copy_tree, staleness, write_file};
use crate::report::ErrorReport;
use crate::runner::{CommandRunner, CommandSpec};

pub const STATE_FILE: &str = "state.tf.json";
pub const OUTPUT_FILE: &str = "output.json";

/// Backend used when `config.terraform.state` is absent.
const DEFAULT_STATE_BACKEND: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraAction {
    Plan,
    Apply,
    Destroy,
}

impl InfraAction {
    fn as_str(&self) -> &'static str {
        match self {
            InfraAction::Plan => "plan",
            InfraAction::Apply => "apply",
            InfraAction::Destroy => "destroy",
        }
    }
}

/// Values of interest in `output.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfraOutputs {
    pub public_ip: Option<String>,
    pub api_endpoint: Option<String>,
}

impl InfraOutputs {
    /// Lines printed by `infra show`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ip) = &self.public_ip {
            lines.push(format!("ssh -A admin@{}", ip));
        }
        if let Some(endpoint) = &self.api_endpoint {
            lines.push(format!("API endpoint: {}", endpoint));
        }
        lines
    }
}

pub fn parse_outputs(text: &str) -> Result<InfraOutputs> {
    let doc: Value = serde_json::from_str(text)?;
    let string_at = |pointer: &str| doc.pointer(pointer).and_then(Value::as_str).map(str::to_string);
    Ok(InfraOutputs {
        public_ip: string_at("/ec2-eip/value/public_ip"),
        api_endpoint: string_at("/lb_route53_record/value/0/fqdn"),
    })
}

/// `{"terraform": {"backend": {TYPE: {...rest}}}}` from the state settings.
pub fn state_document(state: Option<&serde_yaml::Value>) -> Result<Value> {
    let mut kind = DEFAULT_STATE_BACKEND.to_string();
    let mut rest = Map::new();
    if let Some(serde_yaml::Value::Mapping(map)) = state {
        for (key, value) in map {
            let Some(key) = key.as_str() else {
                return Err(Error::config("config.terraform.state keys must be strings"));
            };
            if key == "type" {
                kind = crate::settings::scalar_to_string(value)
                    .ok_or_else(|| Error::config("config.terraform.state.type must be a scalar"))?;
            } else {
                rest.insert(key.to_string(), serde_json::to_value(value)?);
            }
        }
    }
    let mut backend = Map::new();
    backend.insert(kind, Value::Object(rest));
    Ok(json!({ "terraform": { "backend": backend } }))
}

pub struct Infra<'a> {
    ctx: &'a Context,
    runner: &'a dyn CommandRunner,
}

impl<'a> Infra<'a> {
    pub fn new(ctx: &'a Context, runner: &'a dyn CommandRunner) -> Self {
        Self { ctx, runner }
    }

    pub fn dir(&self) -> PathBuf {
        self.ctx.layout.infra_dir()
    }

    fn sources(&self) -> PathBuf {
        self.ctx.layout.devops_dir().join("terraform")
    }

    /// Rewrite the terraform working directory.
    pub fn generate(&self) -> Result<PathBuf> {
        let dir = self.dir();
        // keep terraform's own state and plugins across regenerations
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.') || n.starts_with("terraform.tfstate"));
                if hidden {
                    continue;
                }
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                } else {
                    fs::remove_file(&path)?;
                }
            }
        }
        let state = state_document(self.ctx.settings.get_opt("config.terraform.state"))?;
        write_file(&dir.join(STATE_FILE), &serde_json::to_string_pretty(&state)?)?;
        let copied = copy_tree(&self.sources(), &dir)?;
        info!("generated infra in {} ({} file(s) copied)", dir.display(), copied);
        Ok(dir)
    }

    pub fn is_stale(&self) -> Result<bool> {
        staleness::is_stale(
            &self.dir().join(STATE_FILE),
            &self.ctx.layout.config_dir(),
            &self.sources(),
        )
    }

    fn terraform(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("terraform").cwd(self.dir());
        if let Some(region) = self
            .ctx
            .settings
            .node_opt(&["be", "infra"])
            .and_then(|infra| infra.config_str("region"))
        {
            spec = spec.env("AWS_DEFAULT_REGION", region);
        }
        spec
    }

    /// `terraform init` followed by the action.
    pub fn run(&self, action: InfraAction, report: &mut ErrorReport) -> Result<()> {
        if action != InfraAction::Destroy && self.is_stale()? {
            self.generate()?;
        }

        let init = self.runner.run(&self.terraform().arg("init"))?;
        if !init.success {
            record(report, "infra", None, &init);
            return Ok(());
        }

        let output = self.runner.run(&self.terraform().arg(action.as_str()).live())?;
        if !output.success {
            record(report, "infra", None, &output);
            return Ok(());
        }

        if action == InfraAction::Apply {
            let outputs = self
                .runner
                .run(&self.terraform().args(["output", "-json"]).captured())?;
            if !outputs.success {
                record(report, "infra", None, &outputs);
                return Ok(());
            }
            if self.runner.dry_run() {
                debug!("dry run, not writing {}", OUTPUT_FILE);
            } else {
                write_file(&self.dir().join(OUTPUT_FILE), &outputs.stdout)?;
            }
            for line in self.outputs()?.unwrap_or_default().lines() {
                println!("{}", line);
            }
        }
        Ok(())
    }

    /// Outputs recorded by the last `apply`, if any.
    pub fn outputs(&self) -> Result<Option<InfraOutputs>> {
        let path = self.dir().join(OUTPUT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        parse_outputs(&fs::read_to_string(path)?).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context_at, PROJECT};
    use crate::runner::{CommandOutput, ScriptedRunner};
    use tempfile::TempDir;

    const OUTPUTS: &str = r#"{
        "ec2-eip": {"value": {"public_ip": "203.0.113.7"}},
        "lb_route53_record": {"value": [{"fqdn": "api.ci.example.com"}]}
    }"#;

    fn project() -> String {
        PROJECT.replace(
            "config:\n  name: acme\n",
            "config:\n  name: acme\n  terraform:\n    state:\n      type: s3\n      bucket: acme-tf\n      key: ci\n",
        )
        .replace(
            "kubeconfig: /nonexistent/kubeconfig\n",
            "kubeconfig: /nonexistent/kubeconfig\n          region: ap-southeast-1\n",
        )
    }

    #[test]
    fn test_state_document() {
        let state: serde_yaml::Value =
            serde_yaml::from_str("type: s3\nbucket: acme-tf\nregion: us-east-1\n").unwrap();
        let doc = state_document(Some(&state)).unwrap();
        assert_eq!(doc["terraform"]["backend"]["s3"]["bucket"], "acme-tf");
        assert!(doc["terraform"]["backend"]["s3"].get("type").is_none());

        let doc = state_document(None).unwrap();
        assert_eq!(doc["terraform"]["backend"]["local"], json!({}));
    }

    #[test]
    fn test_parse_outputs() {
        let outputs = parse_outputs(OUTPUTS).unwrap();
        assert_eq!(outputs.public_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(
            outputs.lines(),
            vec!["ssh -A admin@203.0.113.7", "API endpoint: api.ci.example.com"]
        );
        assert_eq!(parse_outputs("{}").unwrap(), InfraOutputs::default());
    }

    #[test]
    fn test_generate_copies_terraform_sources() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), &project());
        write_file(&dir.path().join("devops/terraform/aws/main.tf"), "# main\n").unwrap();
        let runner = ScriptedRunner::new();
        let infra = Infra::new(&ctx, &runner);

        let out = infra.generate().unwrap();
        assert!(out.join("aws/main.tf").is_file());
        let state = fs::read_to_string(out.join(STATE_FILE)).unwrap();
        assert!(state.contains("\"s3\""));
        assert!(state.contains("\"bucket\": \"acme-tf\""));
    }

    #[test]
    fn test_apply_records_outputs() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), &project());
        let runner = ScriptedRunner::new().on("terraform output -json", CommandOutput::ok(OUTPUTS));
        let infra = Infra::new(&ctx, &runner);
        let mut report = ErrorReport::new();

        infra.run(InfraAction::Apply, &mut report).unwrap();
        assert!(report.is_empty());
        assert_eq!(
            runner.calls(),
            vec!["terraform init", "terraform apply", "terraform output -json"]
        );
        let spec = &runner.specs()[0];
        assert_eq!(spec.cwd.as_deref(), Some(infra.dir().as_path()));
        assert!(spec
            .env
            .contains(&("AWS_DEFAULT_REGION".to_string(), "ap-southeast-1".to_string())));
        assert_eq!(
            infra.outputs().unwrap().unwrap().api_endpoint.as_deref(),
            Some("api.ci.example.com")
        );
    }

    #[test]
    fn test_failed_init_stops() {
        let dir = TempDir::new().unwrap();
        let ctx = context_at(dir.path(), &project());
        let runner = ScriptedRunner::new().on("terraform init", CommandOutput::failed(1, "no provider"));
        let infra = Infra::new(&ctx, &runner);
        let mut report = ErrorReport::new();

        infra.run(InfraAction::Plan, &mut report).unwrap();
        assert_eq!(report.get("infra").unwrap().message, "no provider");
        assert_eq!(runner.calls(), vec!["terraform init"]);
    }
}
