//! `generate`: force regeneration of one family or all of them.

use anyhow::Result;
use clap::Args;

use stackctl::generator::{Family, Generator};
use stackctl::output::emoji;

use super::Session;

/// Regenerate manifests and env files
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Family to regenerate (platform, services, cluster, views); all when omitted
    #[arg(value_name = "FAMILY")]
    pub family: Option<Family>,
}

pub fn execute(session: &Session, args: GenerateArgs) -> Result<i32> {
    let ctx = session.context()?;
    let generator = Generator::new(&ctx);
    let families = match args.family {
        Some(family) => vec![family],
        None => Family::ALL.to_vec(),
    };

    for family in families {
        let written = generator.regenerate(family)?;
        println!(
            "{} {}: {} file(s) in {}",
            emoji(&session.out, "🔧", "[GEN]"),
            family,
            written.len(),
            ctx.layout.deploy_path(family).display()
        );
        if session.verbose {
            for path in &written {
                println!("  {}", path.display());
            }
        }
    }
    Ok(0)
}
