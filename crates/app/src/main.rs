//! Command-line front end: feeds slip images through the pipeline and keeps
//! the expense ledger.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Read payment slips into an expense ledger
#[derive(Parser)]
#[command(name = "slipscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process slip images and append them to the ledger
    Process(commands::ProcessArgs),

    /// Watch an intake folder and process slips as they arrive
    Watch(commands::WatchArgs),

    /// Show recorded slips
    List(commands::ListArgs),

    /// Manage configuration
    Config(commands::ConfigArgs),
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over -v.
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => commands::process(args, config_path).await,
        Commands::Watch(args) => commands::watch(args, config_path).await,
        Commands::List(args) => commands::list(args, config_path),
        Commands::Config(args) => commands::config(args, config_path),
    }
}
