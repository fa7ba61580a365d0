//! # External Commands
//!
//! Every external tool (compose, kubectl, skaffold, terraform) is invoked
//! through the [`CommandRunner`] trait so backends can be exercised without
//! the tools installed. [`SystemRunner`] spawns real processes;
//! [`ScriptedRunner`] records invocations and replays canned results.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// How a command's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Always captured; used for queries whose output is parsed.
    Captured,
    /// Captured unless running verbose, then streamed.
    Quiet,
    /// Streamed to the terminal with stdin attached.
    Live,
}

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            output: OutputMode::Quiet,
        }
    }

    /// Build from a program plus leading arguments, e.g. `["docker", "compose"]`.
    pub fn from_parts(parts: &[String]) -> Self {
        let mut spec = Self::new(parts.first().cloned().unwrap_or_default());
        spec.args.extend(parts.iter().skip(1).cloned());
        spec
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Captured;
        self
    }

    pub fn live(mut self) -> Self {
        self.output = OutputMode::Live;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Message for the error report: captured stderr, or a pointer to the terminal.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            "see terminal output".to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external commands.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether commands are only printed.
    fn dry_run(&self) -> bool {
        false
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    pub verbose: bool,
    pub dry_run: bool,
}

impl SystemRunner {
    pub fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if self.verbose || self.dry_run {
            println!("{}", spec);
        }
        if self.dry_run {
            return Ok(CommandOutput::ok(""));
        }
        log::debug!("running {}", spec);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        command.envs(spec.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        let spawn_error = |e: std::io::Error| Error::CommandSpawn {
            program: spec.program.clone(),
            message: e.to_string(),
        };

        let stream = match spec.output {
            OutputMode::Captured => false,
            OutputMode::Quiet => self.verbose,
            OutputMode::Live => true,
        };
        if stream {
            let status = command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(spawn_error)?;
            return Ok(CommandOutput {
                success: status.success(),
                code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let output = command
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_error)?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Records every command and answers from a list of rules.
///
/// A rule matches when its pattern is a substring of the rendered command
/// line; the first match wins. Unmatched commands succeed with no output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, CommandOutput)>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.push((pattern.into(), output));
        self
    }

    /// Rendered command lines in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Position of the first call containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.contains(pattern))
    }

    pub fn called(&self, pattern: &str) -> bool {
        self.position(pattern).is_some()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.to_string();
        self.calls.borrow_mut().push(spec.clone());
        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
