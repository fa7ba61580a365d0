//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use stackctl::orchestrator::Verb;
use stackctl::settings::{LoadOptions, DEFAULT_ENV, DEFAULT_ENV_PREFIX, DEFAULT_ENV_SEPARATOR};

use crate::commands::{self, Session};

/// stackctl - Deploy a stack to compose or Kubernetes from layered settings
#[derive(Parser, Debug)]
#[command(name = "stackctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Deployment environment selecting config/environments/{ENV}.yml
    #[arg(long, global = true, env = "STACK_ENV", default_value = DEFAULT_ENV)]
    env: String,

    /// Profile overlay selecting config/environments/{ENV}-{PROFILE}.yml
    #[arg(long, global = true, env = "STACK_PROFILE")]
    profile: Option<String>,

    /// Prefix of settings override variables
    #[arg(long, global = true, value_name = "PREFIX", default_value = DEFAULT_ENV_PREFIX)]
    env_prefix: String,

    /// Separator between path segments in override variables
    #[arg(long, global = true, value_name = "SEP", default_value = DEFAULT_ENV_SEPARATOR)]
    env_separator: String,

    /// Echo every external command and stream its output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print external commands without running them
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regenerate manifests and env files
    Generate(commands::generate::GenerateArgs),
    /// Build service images
    Build(commands::lifecycle::ServicesArgs),
    /// Pull service images, all of them when none are named
    Pull(commands::lifecycle::ServicesArgs),
    /// Push service images to the image registry
    Push(commands::lifecycle::ServicesArgs),
    /// Start services, seeding databases on first start
    Up(commands::lifecycle::UpArgs),
    /// Stop services
    Stop(commands::lifecycle::ServicesArgs),
    /// Stop and start services
    Restart(commands::lifecycle::ServicesArgs),
    /// Remove services, or the whole deployment when none are named
    Down(commands::lifecycle::ServicesArgs),
    /// List running services
    Ps,
    /// Run a command in a service container
    Exec(commands::exec::ExecArgs),
    /// Show service logs
    Logs(commands::exec::LogsArgs),
    /// Fetch the identity service's credentials
    Credentials,
    /// Print a generated manifest
    Show(commands::show::ShowArgs),
    /// List the components of a family
    List(commands::show::ListArgs),
    /// Print the API endpoint
    Endpoint,
    /// Provision infrastructure with terraform
    Infra(commands::infra::InfraArgs),
}

impl Cli {
    /// Execute the CLI command, returning the process exit status
    pub fn execute(self) -> Result<i32> {
        init_logging(&self.log_level);

        let mut load = LoadOptions::new(commands::current_dir()?, self.env)
            .with_profile(self.profile);
        load.env_prefix = self.env_prefix;
        load.env_separator = self.env_separator;
        let session = Session::new(load, self.verbose, self.dry_run, &self.color);

        match self.command {
            Commands::Generate(args) => commands::generate::execute(&session, args),
            Commands::Build(args) => {
                commands::lifecycle::execute(&session, Verb::Build, &args.services)
            }
            Commands::Pull(args) => commands::lifecycle::execute(&session, Verb::Pull, &args.services),
            Commands::Push(args) => commands::lifecycle::execute(&session, Verb::Push, &args.services),
            Commands::Up(args) => commands::lifecycle::up(&session, args),
            Commands::Stop(args) => commands::lifecycle::execute(&session, Verb::Stop, &args.services),
            Commands::Restart(args) => {
                commands::lifecycle::execute(&session, Verb::Restart, &args.services)
            }
            Commands::Down(args) => commands::lifecycle::execute(&session, Verb::Down, &args.services),
            Commands::Ps => commands::lifecycle::execute(&session, Verb::Ps, &[]),
            Commands::Exec(args) => commands::exec::exec(&session, args),
            Commands::Logs(args) => commands::exec::logs(&session, args),
            Commands::Credentials => commands::exec::credentials(&session),
            Commands::Show(args) => commands::show::show(&session, args),
            Commands::List(args) => commands::show::list(&session, args),
            Commands::Endpoint => commands::show::endpoint(&session),
            Commands::Infra(args) => commands::infra::execute(&session, args),
        }
    }
}

fn init_logging(level: &str) {
    let mut builder = if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env()
    } else {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(level);
        builder
    };
    // a second init (e.g. from tests) is harmless
    let _ = builder.format_timestamp(None).try_init();
}
