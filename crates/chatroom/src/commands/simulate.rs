//! Simulate command - drive the session registry through a login workload.
//!
//! Sessions are issued on a manual clock, the clock is moved forward, and
//! expired sessions are removed lazily (by validating), by an explicit
//! sweep, or by the background sweeper.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;
use tracing::info;

use chatroom_session::{ManualClock, SessionId, SessionRegistry};

use super::Context;

/// How expired sessions are removed after the clock moves.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionMode {
    /// Validate every issued session (eviction on access)
    Lazy,
    /// Call the registry sweep once
    Sweep,
    /// Run the background sweeper for a few ticks
    Background,
}

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of users logging in
    #[arg(long, default_value_t = 10)]
    pub users: usize,

    /// Logins per user
    #[arg(long, default_value_t = 5)]
    pub sessions_per_user: usize,

    /// TTL of each user's first session in seconds (defaults to the configured TTL)
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Extra seconds added to the TTL of each subsequent session
    #[arg(long, default_value_t = 0)]
    pub spread_secs: u64,

    /// Seconds to move the clock forward after issuing
    #[arg(long, default_value_t = 0)]
    pub advance_secs: i64,

    /// How expired sessions are removed
    #[arg(long, value_enum, default_value_t = EvictionMode::Lazy)]
    pub mode: EvictionMode,

    /// Background sweep interval in milliseconds (background mode only)
    #[arg(long, default_value_t = 50)]
    pub sweep_interval_ms: u64,
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
struct SimulateReport {
    mode: EvictionMode,
    users: usize,
    issued: usize,
    advanced_secs: i64,
    evicted: usize,
    remaining: usize,
    valid: usize,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    if args.users == 0 || args.sessions_per_user == 0 {
        bail!("--users and --sessions-per-user must be greater than zero");
    }

    let mut config = ctx.loaded.config.session_config()?;
    if args.mode == EvictionMode::Background {
        config = config
            .with_sweep(true)
            .with_sweep_interval(Duration::from_millis(args.sweep_interval_ms.max(1)));
    }
    let base_ttl = args
        .ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(config.default_ttl);

    let clock = ManualClock::starting_now();
    let registry = SessionRegistry::with_clock(config, Arc::new(clock.clone()));

    let Some(advance) = chrono::Duration::try_seconds(args.advance_secs) else {
        bail!("--advance-secs {} is out of range", args.advance_secs);
    };

    let mut issued: Vec<(String, SessionId)> = Vec::new();
    for u in 0..args.users {
        let user = format!("user-{u}");
        for s in 0..args.sessions_per_user {
            let Some(ttl) = args
                .spread_secs
                .checked_mul(s as u64)
                .and_then(|extra| base_ttl.checked_add(Duration::from_secs(extra)))
            else {
                bail!("--spread-secs {} overflows the session TTL", args.spread_secs);
            };
            let sid = registry.issue_session(&user, ttl)?;
            issued.push((user.clone(), sid));
        }
    }
    info!(
        users = args.users,
        sessions = issued.len(),
        "Issued simulated sessions"
    );

    if clock.advance(advance).is_none() {
        bail!(
            "advancing the clock by {}s leaves the representable time range",
            args.advance_secs
        );
    }
    let before = registry.stats().sessions;

    match args.mode {
        EvictionMode::Lazy => {}
        EvictionMode::Sweep => {
            registry.sweep();
        }
        EvictionMode::Background => {
            if let Some(handle) = registry.start_sweeper() {
                tokio::time::sleep(registry.config().sweep_interval * 3).await;
                handle.shutdown().await;
            }
        }
    }

    // Validation evicts on access, so count after it in lazy mode.
    let valid = issued
        .iter()
        .filter(|(user, sid)| registry.validate_session(user, &sid.id))
        .count();
    let remaining = registry.stats().sessions;
    registry.check_consistency()?;

    let report = SimulateReport {
        mode: args.mode,
        users: args.users,
        issued: issued.len(),
        advanced_secs: args.advance_secs,
        evicted: before.saturating_sub(remaining),
        remaining,
        valid,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", style("Simulation").bold());
        println!("  mode:      {:?}", report.mode);
        println!("  users:     {}", report.users);
        println!("  issued:    {}", report.issued);
        println!("  advanced:  {}s", report.advanced_secs);
        println!("  evicted:   {}", report.evicted);
        println!("  remaining: {}", report.remaining);
        println!("  valid:     {}", report.valid);
    }

    Ok(())
}
