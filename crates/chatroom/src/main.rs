//! Chatroom - session index tooling
//!
//! Main entry point for the chatroom CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;

use commands::{config, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Chatroom - expiry-ordered session index for the chat server
#[derive(Parser)]
#[command(name = "chatroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "CHATROOM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration management
    Config(config::ConfigArgs),

    /// Drive the session registry through a simulated login workload
    Simulate(simulate::SimulateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load(cli.config.as_deref())?;
    let logging = loaded.config.logging();

    // Console (human-readable) + optional rotating JSON file
    let console_filter = if cli.verbose {
        "chatroom=debug,chatroom_session=debug,chatroom_config=debug,info".to_string()
    } else {
        format!(
            "chatroom={lvl},chatroom_session={lvl},chatroom_config={lvl},warn",
            lvl = logging.level
        )
    };

    let (file_layer, _guard) = if logging.json_file {
        let log_dir = logging
            .directory
            .clone()
            .or_else(|| chatroom_config::xdg_config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "chatroom.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "chatroom=trace,chatroom_session=trace,chatroom_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    match cli.command {
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
    }
}
