mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::AvatarArgs;
use crate::config::AppConfig;

/// Stockdash - stock dashboard core services
#[derive(Parser)]
#[command(name = "stockdash")]
#[command(about = "Stockdash - stock dashboard core services")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the shared database connection once; exit 1 on failure
    CheckDb,
    /// Print a JSON health report
    Health,
    /// Inspect or edit avatar preferences
    Avatar(AvatarArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (STOCKDASH__*)
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(cli.verbose, &config.logging);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    if cli.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(ExitCode::SUCCESS);
    }

    match cli.command {
        Some(Commands::CheckDb) => commands::check_db(&config).await,
        Some(Commands::Health) => commands::health(&config).await,
        Some(Commands::Avatar(args)) => commands::avatar(&config, args).await,
        None => {
            eprintln!("no command given; see --help");
            Ok(ExitCode::from(2))
        }
    }
}
