//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use chatroom_config::{ChatroomConfig, LoggingSection, SessionSection};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show the user configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./chatroom.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::Init { local, force } => cmd_init(local, force),
    }
}

#[derive(Serialize)]
struct ShowOutput {
    sources: Vec<PathBuf>,
    session: SessionSection,
    logging: LoggingSection,
    warnings: Vec<String>,
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    // Reject out-of-range values here rather than at first use.
    config.session_config()?;

    let session = config.session();
    let logging = config.logging();

    if ctx.json_output {
        let output = ShowOutput {
            sources: ctx
                .loaded
                .loaded_from()
                .into_iter()
                .map(|p| p.to_path_buf())
                .collect(),
            session,
            logging,
            warnings: ctx.loaded.warnings.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}\n", style("# Chatroom Configuration").bold());

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Session:");
    println!("  ttl: {}s", session.ttl_secs);
    println!("  id bytes: {}", session.id_bytes);
    if session.sweep_enabled {
        println!("  sweep: every {}s", session.sweep_interval_secs);
    } else {
        println!("  sweep: disabled (expiry enforced on access)");
    }
    println!();

    println!("Logging:");
    println!("  level: {}", logging.level);
    println!(
        "  json file: {}",
        if logging.json_file { "enabled" } else { "disabled" }
    );
    if let Some(ref dir) = logging.directory {
        println!("  directory: {}", dir.display());
    }
    println!();

    if !ctx.loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &ctx.loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");
    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            style("✓ loaded").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();
    Ok(())
}

fn cmd_path() -> Result<()> {
    match chatroom_config::xdg_config_path() {
        Some(path) => println!("{}", path.display()),
        None => bail!("could not determine the user config directory"),
    }
    Ok(())
}

fn cmd_init(local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("chatroom.toml")
    } else {
        match chatroom_config::xdg_config_path() {
            Some(path) => path,
            None => bail!("could not determine the user config directory"),
        }
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    chatroom_config::save_config(&ChatroomConfig::with_defaults(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
