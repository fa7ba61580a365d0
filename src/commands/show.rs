//! Read-only views: `show`, `list` and `endpoint`.

use std::fs;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use stackctl::generator::{Family, Generator};
use stackctl::output::emoji;

use super::Session;

/// Print a generated manifest
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// `SERVICE` for its manifest, or `SERVICE/FILE` for another generated file
    pub target: String,
}

/// List the components of a family
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(value_name = "FAMILY", default_value = "platform")]
    pub family: Family,
}

pub fn show(session: &Session, args: ShowArgs) -> Result<i32> {
    let ctx = session.context()?;
    let generator = Generator::new(&ctx);
    generator.refresh()?;

    let (service, file) = match args.target.split_once('/') {
        Some((service, file)) => (service.to_string(), file.to_string()),
        None => (args.target.clone(), format!("{}.yml", args.target)),
    };
    for family in Family::ALL {
        let belongs = generator.service(family, &service).is_some();
        let path = ctx.layout.deploy_path(family).join(&file);
        if belongs && path.is_file() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            print!("{}", text);
            return Ok(0);
        }
    }
    bail!("no generated file '{}' for service '{}'", file, service)
}

pub fn list(session: &Session, args: ListArgs) -> Result<i32> {
    let ctx = session.context()?;
    let Some(node) = ctx.settings.node_opt(args.family.settings_path()) else {
        println!(
            "{} no {} components configured",
            emoji(&session.out, "ℹ️", "[INFO]"),
            args.family
        );
        return Ok(0);
    };
    for component in &node.components {
        if component.is_enabled() {
            println!("{}", component.name);
        } else {
            println!("{} (disabled)", component.name);
        }
    }
    Ok(0)
}

pub fn endpoint(session: &Session) -> Result<i32> {
    let ctx = session.context()?;
    println!("{}", ctx.naming.api_uri);
    Ok(0)
}
