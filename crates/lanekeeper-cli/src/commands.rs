//! Subcommand implementations. Each function takes its parsed args plus a
//! resolved `OpsLayout` and returns `anyhow::Result<()>` — errors surface to
//! the process boundary with context, never a panic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lanekeeper_core::config::LaneAConfig;
use lanekeeper_core::registry::Registry;
use lanekeeper_core::{OpsLayout, RepoId};

#[derive(Args)]
pub struct OrchestrateArgs {
    /// Registry JSON file listing known repos.
    #[arg(long)]
    pub registry: PathBuf,
    /// Root directory repo paths in the registry are relative to.
    #[arg(long)]
    pub repos_root: PathBuf,
    /// Cap per-action batch size (repos indexed, events processed, intakes emitted).
    #[arg(long)]
    pub limit: Option<usize>,
    /// Compute and report the next action without writing anything outside state/error artifacts.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn orchestrate(ops_root: &PathBuf, config: &LaneAConfig, args: OrchestrateArgs) -> Result<()> {
    let layout = OpsLayout::new(ops_root.clone());
    let registry = Registry::load(&args.registry)
        .with_context(|| format!("loading registry at {}", args.registry.display()))?;

    let now = now_iso();
    let expires = now_iso();
    let inputs = lanekeeper_core::orchestrator::TickInputs {
        registry: &registry,
        repos_root: &args.repos_root,
        open_decisions: lanekeeper_core::orchestrator::OpenDecisions::default(),
        committees: lanekeeper_core::orchestrator::CommitteeSnapshot::default(),
        minimum_sufficient: true,
        sufficiency_sufficient: true,
        previous_stage: None,
    };

    let result = lanekeeper_core::orchestrator::orchestrate(
        &layout,
        inputs,
        config,
        now_unix_ms(),
        &now,
        &expires,
        args.limit,
        args.dry_run,
        &lanekeeper_core::collaborators::NoopKnowledgeScan,
        &lanekeeper_core::collaborators::PassthroughCommitteeChair,
        &lanekeeper_core::collaborators::LocalUpdateMeeting,
    )
    .context("running orchestrator tick")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[derive(Args)]
pub struct IndexArgs {
    /// The registry-assigned id of the repo to index.
    #[arg(long)]
    pub repo_id: String,
    /// Path to the repo's git worktree.
    #[arg(long)]
    pub repo_path: PathBuf,
    /// Branch to resolve instead of HEAD.
    #[arg(long)]
    pub active_branch: Option<String>,
    /// Compute the index without writing it.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn index(ops_root: &PathBuf, args: IndexArgs) -> Result<()> {
    let layout = OpsLayout::new(ops_root.clone());
    let repo_id = RepoId::new(&args.repo_id).context("validating repo_id")?;
    let repo = lanekeeper_git::GixRepo::open(&args.repo_path)
        .with_context(|| format!("opening git repo at {}", args.repo_path.display()))?;

    let outcome = lanekeeper_core::indexer::index_repo(
        &repo,
        &repo_id,
        args.active_branch.as_deref(),
        &layout,
        args.dry_run,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{}", serde_json::to_string_pretty(&outcome.repo_index)?);
    Ok(())
}

#[derive(Args)]
pub struct RefreshArgs {
    #[arg(long)]
    pub registry: PathBuf,
    #[arg(long)]
    pub repos_root: PathBuf,
    #[arg(long)]
    pub max_events: Option<usize>,
    #[arg(long)]
    pub stop_on_error: bool,
    #[arg(long)]
    pub dry_run: bool,
}

pub fn refresh(ops_root: &PathBuf, args: RefreshArgs) -> Result<()> {
    let layout = OpsLayout::new(ops_root.clone());
    let registry = Registry::load(&args.registry)
        .with_context(|| format!("loading registry at {}", args.registry.display()))?;

    let report = lanekeeper_core::refresh::run(
        &layout,
        &registry,
        &args.repos_root,
        &now_iso(),
        args.stop_on_error,
        args.max_events,
        args.dry_run,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(Args)]
pub struct QaFollowupArgs {
    #[arg(long)]
    pub max_events: Option<usize>,
    #[arg(long)]
    pub dry_run: bool,
}

pub fn qa_followup(ops_root: &PathBuf, args: QaFollowupArgs) -> Result<()> {
    let layout = OpsLayout::new(ops_root.clone());
    let report = lanekeeper_core::qa_followup::run(&layout, &now_iso(), args.dry_run, args.max_events)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!(
        "{}",
        serde_json::json!({
            "ok": report.ok,
            "processed_lines": report.processed_lines,
            "merge_events_seen": report.merge_events_seen,
            "created": report.created.iter().map(|c| &c.intake_path).collect::<Vec<_>>(),
            "skipped": report.skipped,
            "warnings": report.warnings,
        })
    );
    Ok(())
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn now_iso() -> String {
    let ms = now_unix_ms();
    let secs = ms.div_euclid(1000);
    let millis = ms.rem_euclid(1000);
    let days = secs.div_euclid(86400);
    let secs_of_day = secs.rem_euclid(86400);
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}
