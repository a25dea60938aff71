//! Command-line front end for the extraction pipeline.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CategorizeArgs, ExtractArgs, WatchArgs};

/// Turn receipts and bank statements into transaction records
#[derive(Parser, Debug)]
#[command(name = "nota")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a transaction from one PDF or image and print it as JSON
    Extract(ExtractArgs),

    /// Print the category for each description
    Categorize(CategorizeArgs),

    /// Process every file dropped into an intake directory
    Watch(WatchArgs),
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Extract(args) => commands::extract(args, config).await,
        Commands::Categorize(args) => commands::categorize(args, config).await,
        Commands::Watch(args) => commands::watch(args, config).await,
    }
}
