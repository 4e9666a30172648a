mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, denylist::DenylistSubcommand, ratchets::RatchetSubcommand,
    run::RunArgs, slices::SliceSubcommand,
};
use guard_core::GuardError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "guard",
    about = "Migration governance: ratchets, denylists, deletion targets and dependency-ordered slices",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .migration/ or .git/)
    #[arg(long, global = true, env = "GUARD_ROOT")]
    root: Option<PathBuf>,

    /// Path to config.yaml; the other records are read from the same directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold .migration/ with a default config and empty records
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Run every guard and report
    Run(RunArgs),

    /// Inspect and advance migration slices
    Slices {
        #[command(subcommand)]
        subcommand: SliceSubcommand,
    },

    /// Inspect, check and lower ratchet budgets
    Ratchets {
        #[command(subcommand)]
        subcommand: RatchetSubcommand,
    },

    /// Inspect and retire denylist rules
    Denylist {
        #[command(subcommand)]
        subcommand: DenylistSubcommand,
    },

    /// Show or validate the control plane configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Run(args) => cmd::run::run(&root, config, args, cli.json),
        Commands::Slices { subcommand } => cmd::slices::run(&root, config, subcommand, cli.json),
        Commands::Ratchets { subcommand } => {
            cmd::ratchets::run(&root, config, subcommand, cli.json)
        }
        Commands::Denylist { subcommand } => {
            cmd::denylist::run(&root, config, subcommand, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Exit status for a failed command. Errors that did not come from the
/// engine (bad arguments, unreadable overrides) are treated as configuration
/// errors.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GuardError>())
        .map(GuardError::exit_code)
        .unwrap_or(2)
}
