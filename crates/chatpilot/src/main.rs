//! ChatPilot - streaming chat backend with web and data-analysis tools
//!
//! Main entry point for the ChatPilot CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// ChatPilot - streaming chat backend with web and data-analysis tools
#[derive(Parser)]
#[command(name = "chatpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file layered over the discovered ones
    #[arg(long, global = true, env = "CHATPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the ChatPilot server
    Start(start::StartArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

/// Environment variable overriding the log directory.
const LOG_DIR_ENV: &str = "CHATPILOT_LOG_DIR";

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + daily rotating JSON file. RUST_LOG wins over -v.
    let console_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "chatpilot=debug,chatpilot_agent=debug,chatpilot_llm=debug,chatpilot_server=debug,chatpilot_sandbox=debug,chatpilot_session=debug,chatpilot_config=debug,info"
        } else {
            "info"
        }
        .to_string()
    });

    let log_dir = std::env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("chatpilot").join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "chatpilot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "chatpilot=trace,chatpilot_agent=trace,chatpilot_llm=debug,chatpilot_server=debug,chatpilot_sandbox=debug,chatpilot_session=debug,chatpilot_config=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
