//! Interactive verbs: `exec`, `logs` and `credentials`.

use anyhow::{bail, Result};
use clap::Args;

use stackctl::backend::{InstanceBackend, LogOptions};
use stackctl::naming::BackendKind;
use stackctl::orchestrator::Verb;
use stackctl::report::ErrorReport;

use super::{finish, lifecycle, Session};

/// Run a command in a service container
#[derive(Args, Debug)]
pub struct ExecArgs {
    pub service: String,

    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Show service logs
#[derive(Args, Debug)]
pub struct LogsArgs {
    pub service: String,

    /// Follow the log output
    #[arg(short, long)]
    pub follow: bool,

    /// Pick the pod of one role (profile)
    #[arg(long)]
    pub role: Option<String>,
}

pub fn exec(session: &Session, args: ExecArgs) -> Result<i32> {
    let verb = Verb::Exec {
        service: args.service,
        command: args.command,
    };
    lifecycle::execute(session, verb, &[])
}

pub fn logs(session: &Session, args: LogsArgs) -> Result<i32> {
    let verb = Verb::Logs {
        service: args.service,
        options: LogOptions {
            follow: args.follow,
            role: args.role,
        },
    };
    lifecycle::execute(session, verb, &[])
}

/// Fetch and print the identity service's credentials.
pub fn credentials(session: &Session) -> Result<i32> {
    let ctx = session.context()?;
    if ctx.naming.backend != BackendKind::Instance {
        bail!("credentials are only cached for the instance backend");
    }
    let runner = session.runner();
    let mut report = ErrorReport::new();
    if let Some(text) = InstanceBackend::new(&ctx, &runner).credentials(&mut report)? {
        println!("{}", text.trim_end());
    }
    Ok(finish(session, &report))
}
