// src/main.rs

mod config;
mod fetch;
mod incident;
mod inspect;
mod scrape;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use incident::PollArgs;
use inspect::InspectArgs;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the live incident page and every incident's details once
    Incidents(PollArgs),
    /// Keep polling the live incident page
    Watch(PollArgs),
    /// Extract fields or links from a saved portal page
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file, if present
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for logging, honouring RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();
    match cli.command {
        Commands::Incidents(args) => {
            incident::run(args).await.context("Incident poll failed")?;
        }
        Commands::Watch(args) => {
            incident::watch(args).await.context("Watch loop failed")?;
        }
        Commands::Inspect(args) => {
            inspect::run(args).context("Inspection failed")?;
        }
    }

    Ok(())
}
