//! `infra`: terraform provisioning of the deployment's infrastructure.

use anyhow::Result;
use clap::{Args, Subcommand};

use stackctl::infra::{Infra, InfraAction};
use stackctl::report::ErrorReport;

use super::{finish, Session};

/// Provision infrastructure with terraform
#[derive(Args, Debug)]
pub struct InfraArgs {
    #[command(subcommand)]
    pub command: InfraCommand,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum InfraCommand {
    /// Show the terraform plan
    Plan,
    /// Apply the plan and record its outputs
    Apply,
    /// Destroy the infrastructure
    Destroy,
    /// Show the outputs of the last apply
    Show,
}

pub fn execute(session: &Session, args: InfraArgs) -> Result<i32> {
    let ctx = session.context()?;
    let runner = session.runner();
    let infra = Infra::new(&ctx, &runner);

    let action = match args.command {
        InfraCommand::Plan => InfraAction::Plan,
        InfraCommand::Apply => InfraAction::Apply,
        InfraCommand::Destroy => InfraAction::Destroy,
        InfraCommand::Show => {
            match infra.outputs()? {
                Some(outputs) => {
                    for line in outputs.lines() {
                        println!("{}", line);
                    }
                }
                None => println!("no outputs recorded, run 'stackctl infra apply' first"),
            }
            return Ok(0);
        }
    };

    let mut report = ErrorReport::new();
    infra.run(action, &mut report)?;
    Ok(finish(session, &report))
}
