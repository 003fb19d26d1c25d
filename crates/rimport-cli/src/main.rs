//! # rimport
//!
//! Command line front end for remote module imports.
//!
//! Loads the effective configuration, sets up logging and dispatches to the
//! command handlers. Errors are printed with an actionable hint when one is
//! known and turn into a non-zero exit status.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Import modules from remote namespaces
#[derive(Parser)]
#[command(name = "rimport", version, about = "Remote module imports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of discovering rimport.toml
    #[arg(long, global = true, value_name = "FILE", env = "RIMPORT_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a module through the configured remotes
    Fetch {
        /// Dotted module path, e.g. demo.a
        module: String,
        /// Print the module source instead of its origin
        #[arg(long)]
        print: bool,
    },
    /// Resolve every configured namespace root
    Check,
    /// Inspect or clean the artifact cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show entry counts and disk usage
    Stats,
    /// Remove every cached entry
    Clear,
    /// Remove entries not validated within the given age
    Prune {
        #[arg(long, value_name = "SECS")]
        older_than: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting rimport v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", ErrorFormatter::new().format_report(&e));
            ExitCode::FAILURE
        },
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let ctx = CommandContext::load(cli.config.as_deref()).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rimport_cli={level},rimport_loader={level},rimport_backend={level},rimport_cache={level},rimport_config={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("rimport encountered an unexpected error: {}", panic_info);
        eprintln!("rimport crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
