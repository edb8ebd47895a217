//! Deskpilot CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive chat or single-message mode
//! - `actions` — List the registered actions and their gates
//! - `doctor`  — Diagnose configuration and gateway health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deskpilot",
    about = "Deskpilot — an LLM desktop-automation agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List the registered actions
    Actions,

    /// Diagnose configuration and gateway health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Actions => commands::actions::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
