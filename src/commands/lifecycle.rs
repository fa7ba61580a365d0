//! Lifecycle verbs: `build`, `pull`, `push`, `up`, `stop`, `restart`, `down` and `ps`.

use anyhow::Result;
use clap::Args;

use stackctl::backend::UpOptions;
use stackctl::orchestrator::{Orchestrator, Verb};

use super::{finish, Session};

/// Services to act on; defaults to the enabled platform services.
#[derive(Args, Debug)]
pub struct ServicesArgs {
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,
}

/// Start services.
#[derive(Args, Debug)]
pub struct UpArgs {
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,

    /// Build images before starting
    #[arg(short, long)]
    pub build: bool,

    /// Reseed databases even when already migrated
    #[arg(long)]
    pub seed: bool,

    /// Recreate namespaced resources and redeploy present services
    #[arg(short, long)]
    pub force: bool,

    /// Keep the service attached to the terminal
    #[arg(long)]
    pub foreground: bool,
}

impl From<&UpArgs> for UpOptions {
    fn from(args: &UpArgs) -> Self {
        UpOptions {
            build: args.build,
            seed: args.seed,
            force: args.force,
            foreground: args.foreground,
        }
    }
}

/// Run `verb` on `services` through the active backend.
pub fn execute(session: &Session, verb: Verb, services: &[String]) -> Result<i32> {
    let ctx = session.context()?;
    let runner = session.runner();
    log::info!(
        "{} on {} backend, feature set {}",
        verb.attribute(),
        ctx.naming.backend,
        ctx.naming.feature_set
    );
    let report = Orchestrator::new(&ctx, &runner).run(&verb, services);
    Ok(finish(session, &report))
}

pub fn up(session: &Session, args: UpArgs) -> Result<i32> {
    let verb = Verb::Up(UpOptions::from(&args));
    execute(session, verb, &args.services)
}
