use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lanekeeper_cli::commands;
use lanekeeper_core::config::LaneAConfig;

/// Lane A orchestrator: knowledge-state indexing, staleness, and committee
/// coordination for the dual-lane software-engineering workflow.
///
/// Reads and writes operational state under `OPS_ROOT` (see `--ops-root` or
/// `AI_PROJECT_ROOT`). Never mutates the repositories it indexes.
#[derive(Parser)]
#[command(name = "lanekeeper")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Absolute root of operational state for this project on this host.
    /// Falls back to `AI_PROJECT_ROOT`.
    #[arg(long, env = "AI_PROJECT_ROOT")]
    ops_root: PathBuf,

    /// Optional TOML config file (see `LaneAConfig`).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one orchestrator tick: compute state, decide the next action, execute it.
    Orchestrate(commands::OrchestrateArgs),

    /// Index a single repo at its current (or a specified) git ref.
    Index(commands::IndexArgs),

    /// Apply newly appended events: re-index impacted repos, mark committees stale.
    Refresh(commands::RefreshArgs),

    /// Emit Lane B intakes for merges obliged to add E2E coverage that didn't.
    #[command(name = "qa-followup")]
    QaFollowup(commands::QaFollowupArgs),
}

fn main() -> Result<()> {
    lanekeeper_cli::telemetry::init();
    let cli = Cli::parse();

    let config = LaneAConfig::load(cli.config.as_deref())
        .context("loading Lane A configuration")?;

    match cli.command {
        Commands::Orchestrate(args) => commands::orchestrate(&cli.ops_root, &config, args),
        Commands::Index(args) => commands::index(&cli.ops_root, args),
        Commands::Refresh(args) => commands::refresh(&cli.ops_root, args),
        Commands::QaFollowup(args) => commands::qa_followup(&cli.ops_root, args),
    }
}
