//! # CLI Command Implementations
//!
//! One module per group of subcommands. Each module defines its `clap`
//! argument structs and an `execute` function returning the process exit
//! status: the number of failures recorded in the run's error report.
//! Fatal errors are returned as `anyhow` errors and end the process with 1.

pub mod exec;
pub mod generate;
pub mod infra;
pub mod lifecycle;
pub mod show;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use stackctl::context::Context;
use stackctl::output::{report_lines, OutputConfig};
use stackctl::report::ErrorReport;
use stackctl::runner::SystemRunner;
use stackctl::settings::LoadOptions;

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Session {
    pub load: LoadOptions,
    pub verbose: bool,
    pub dry_run: bool,
    pub out: OutputConfig,
}

impl Session {
    pub fn new(load: LoadOptions, verbose: bool, dry_run: bool, color: &str) -> Self {
        Self {
            load,
            verbose,
            dry_run,
            out: OutputConfig::from_env_and_flag(color),
        }
    }

    pub fn context(&self) -> Result<Context> {
        Context::load(&self.load).with_context(|| {
            format!(
                "failed to load settings for env '{}' from {}",
                self.load.env,
                self.load.start_dir.display()
            )
        })
    }

    pub fn runner(&self) -> SystemRunner {
        SystemRunner::new(self.verbose, self.dry_run)
    }
}

/// Working directory the settings search starts from.
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("failed to get current directory")
}

/// Print the summary and turn the report into an exit status.
pub fn finish(session: &Session, report: &ErrorReport) -> i32 {
    for line in report_lines(&session.out, report) {
        eprintln!("{}", line);
    }
    report.exit_code()
}
