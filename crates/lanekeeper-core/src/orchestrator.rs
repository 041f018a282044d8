//! Lane A orchestrator (§4.1): on each tick, compute state, decide the next
//! action, persist artifacts, and execute at most one action.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use lanekeeper_git::{GitRepo, GixRepo};

use crate::atomic::write_atomic;
use crate::collaborators::{CommitteeChair, KnowledgeScan, KnowledgeUpdateMeeting, MeetingMode};
use crate::config::LaneAConfig;
use crate::ids::ConsumerName;
use crate::indexer::{self};
use crate::lock::{self, GuardedAcquireOutcome, LockMetadata};
use crate::log;
use crate::paths::OpsLayout;
use crate::qa_followup;
use crate::registry::{RepoEntry, Registry};
use crate::staleness::{self, RepoStalenessInput, SoftStaleTracker};
use crate::state::{ActionType, EvidenceLevel, EvidenceState, LaneAState, NextAction, Stage};

/// Decision packets currently open; the orchestrator treats any non-empty
/// list as blocking (priority 1, §4.1).
#[derive(Clone, Debug, Default)]
pub struct OpenDecisions {
    pub ids: Vec<String>,
}

/// Per-repo committee verdict, as last recorded by the committee chair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitteeVerdict {
    Missing,
    Stale,
    Failed,
    Passed,
}

/// Snapshot of committee state across all active repos plus the system
/// integration output, as computed at the start of a tick.
#[derive(Clone, Debug, Default)]
pub struct CommitteeSnapshot {
    pub repo_verdicts: Vec<(String, CommitteeVerdict)>,
    pub integration_verdict: Option<CommitteeVerdict>,
}

/// Everything the orchestrator needs about the current tick's environment
/// beyond what it can compute from the filesystem itself.
pub struct TickInputs<'a> {
    pub registry: &'a Registry,
    pub repos_root: &'a Path,
    pub open_decisions: OpenDecisions,
    pub committees: CommitteeSnapshot,
    pub minimum_sufficient: bool,
    pub sufficiency_sufficient: bool,
    pub previous_stage: Option<Stage>,
}

/// Result of one `Orchestrate` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestrateResult {
    pub ok: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_state: Option<EvidenceState>,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An unrecoverable orchestrator error, always captured as `state.error.json`.
#[derive(Debug)]
pub enum OrchestratorError {
    Lock(crate::lock::LockError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

fn index_present(layout: &OpsLayout, repo_id: &crate::ids::RepoId) -> bool {
    layout.repo_index_json(repo_id).exists() && layout.repo_fingerprints_json(repo_id).exists()
}

/// A repo's scan coverage is tracked by a small marker file the orchestrator
/// writes itself after a successful `Scan` action, separate from the index
/// (§3.1): a repo can be indexed but not yet scanned.
fn scan_status_present(layout: &OpsLayout, repo_id: &crate::ids::RepoId) -> bool {
    layout.repo_scan_status_json(repo_id).exists()
}

fn write_scan_status(layout: &OpsLayout, repo_id: &crate::ids::RepoId, now: &str) {
    let path = layout.repo_scan_status_json(repo_id);
    let body = serde_json::json!({ "scanned_at": now }).to_string();
    let _ = write_atomic(&path, body.as_bytes());
}

/// Invalidate a repo's scan-completion marker: a fresh index means the repo's
/// content has moved and the prior scan no longer covers it.
fn invalidate_scan_status(layout: &OpsLayout, repo_id: &crate::ids::RepoId) {
    let _ = fs::remove_file(layout.repo_scan_status_json(repo_id));
}

fn count_fingerprinted_source_evidence(layout: &OpsLayout, registry: &Registry) -> usize {
    const COUNTED: &[&str] = &["source", "api_contract", "schema", "migration"];
    let mut total = 0;
    for repo in registry.active() {
        let path = layout.repo_fingerprints_json(&repo.repo_id);
        let Ok(text) = fs::read_to_string(&path) else { continue };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else { continue };
        let Some(files) = value.get("files").and_then(|v| v.as_array()) else { continue };
        total += files
            .iter()
            .filter(|f| {
                f.get("category")
                    .and_then(|c| c.as_str())
                    .is_some_and(|c| COUNTED.contains(&c))
            })
            .count();
    }
    total
}

/// Unconsumed events pending the refresh-from-events consumer, plus which
/// repos they touch (needed by the staleness pass's unconsumed-merge-events
/// signal without re-reading the event log a second time).
struct PendingEvents {
    count: u64,
    merge_repo_ids: BTreeSet<String>,
}

fn compute_pending_events(layout: &OpsLayout, now_iso: &str) -> PendingEvents {
    let consumer = ConsumerName::new("refresh-from-events").expect("literal consumer name is valid");
    let checkpoint = match crate::checkpoint::read(layout, &consumer, now_iso) {
        Ok(c) => c,
        Err(_) => return PendingEvents { count: 0, merge_repo_ids: BTreeSet::new() },
    };
    let lines = match (&checkpoint.last_processed_segment, &checkpoint.last_processed_event_id) {
        (Some(segment), Some(event_id)) => {
            log::read_forward_from_event_id(layout, segment, event_id).unwrap_or_default()
        }
        _ => log::read_forward_from_offset(layout, None, 0).unwrap_or_default(),
    };

    let mut merge_repo_ids = BTreeSet::new();
    for line in &lines {
        let Ok(event) = crate::events::KnowledgeEvent::from_line(&line.text) else { continue };
        if event.event_type.is_merge() {
            if let Some(repo_id) = &event.repo_id {
                merge_repo_ids.insert(repo_id.as_str().to_owned());
            }
        }
    }

    PendingEvents { count: lines.len() as u64, merge_repo_ids }
}

fn day_key_from_iso(now_iso: &str) -> String {
    now_iso.get(0..10).unwrap_or(now_iso).replace('-', "")
}

fn hours_between(earlier_iso: &str, now_iso: &str) -> Option<u32> {
    let earlier = lock::parse_epoch_ms(earlier_iso)?;
    let now = lock::parse_epoch_ms(now_iso)?;
    u32::try_from((now - earlier).max(0) / 3_600_000).ok()
}

/// Build one repo's staleness input from its persisted index and the
/// live git HEAD, without requiring a fresh scan or index pass this tick.
fn build_staleness_input(
    repos_root: &Path,
    layout: &OpsLayout,
    entry: &RepoEntry,
    pending: &PendingEvents,
    now_iso: &str,
) -> Option<RepoStalenessInput> {
    let repo = GixRepo::open(&repos_root.join(&entry.path)).ok()?;
    let repo_head_sha = repo
        .rev_parse(entry.active_branch.as_deref().unwrap_or("HEAD"))
        .ok()?
        .to_string();

    let index: Option<indexer::RepoIndex> = fs::read_to_string(layout.repo_index_json(&entry.repo_id))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok());

    let last_scanned_head_sha = index.as_ref().map(|i| i.head_sha.clone());
    let last_scan_time = index.as_ref().map(|i| i.scanned_at.clone());
    let scan_age_hours = last_scan_time.as_deref().and_then(|t| hours_between(t, now_iso));

    Some(RepoStalenessInput {
        repo_id: entry.repo_id.as_str().to_owned(),
        repo_head_sha,
        last_scanned_head_sha,
        last_scan_time,
        last_merge_event_time: None,
        has_unconsumed_merge_events: pending.merge_repo_ids.contains(entry.repo_id.as_str()),
        scan_age_hours,
    })
}

fn load_soft_stale_tracker(layout: &OpsLayout, now_iso: &str) -> SoftStaleTracker {
    fs::read_to_string(layout.soft_stale_tracker_json())
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| SoftStaleTracker::new(layout.root().display().to_string().as_str(), now_iso))
}

fn persist_soft_stale_tracker(layout: &OpsLayout, tracker: &SoftStaleTracker) {
    let json = serde_json::to_vec_pretty(tracker).unwrap_or_default();
    let _ = write_atomic(&layout.soft_stale_tracker_json(), &json);
}

fn write_refresh_hint(layout: &OpsLayout, now_iso: &str, scope: &str, reason: &str) {
    let dir = layout.refresh_hints_dir();
    let _ = fs::create_dir_all(&dir);
    let ts = qa_followup::fs_safe_timestamp(now_iso);
    let slug: String = scope
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let path = dir.join(format!("RH-{ts}__{slug}.json"));
    let body = serde_json::json!({ "scope": scope, "reason": reason, "at": now_iso }).to_string();
    let _ = write_atomic(&path, body.as_bytes());
    prune_capped(&dir, 50);
}

fn prune_capped(dir: &Path, cap: usize) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    let mut files: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    files.sort();
    if files.len() > cap {
        for path in &files[..files.len() - cap] {
            let _ = fs::remove_file(path);
        }
    }
}

fn decide_stage(
    evidence_level: EvidenceLevel,
    missing_index_repos: &[String],
    missing_scan_repos: &[String],
    kickoff_insufficient: bool,
    low_code_evidence: bool,
    pending_events: u64,
    minimum_sufficient: bool,
    inputs: &TickInputs<'_>,
    limit: Option<usize>,
) -> (Stage, NextAction) {
    let cap = |repos: &[String]| -> Vec<String> {
        let mut sorted = repos.to_vec();
        sorted.sort();
        match limit {
            Some(l) => sorted.into_iter().take(l).collect(),
            None => sorted,
        }
    };

    if !inputs.open_decisions.ids.is_empty() {
        return (
            Stage::DecisionNeeded,
            NextAction {
                action_type: ActionType::Question,
                target_repos: vec![],
                reason: "open decision packets pending resolution".to_owned(),
            },
        );
    }

    if evidence_level == EvidenceLevel::None {
        return (
            Stage::NeedsIndex,
            NextAction {
                action_type: ActionType::Index,
                target_repos: cap(missing_index_repos),
                reason: "one or more active repos lack an index".to_owned(),
            },
        );
    }

    if evidence_level == EvidenceLevel::Partial {
        return (
            Stage::NeedsScan,
            NextAction {
                action_type: ActionType::Scan,
                target_repos: cap(missing_scan_repos),
                reason: "one or more active repos lack a scan".to_owned(),
            },
        );
    }

    if kickoff_insufficient && low_code_evidence {
        return (
            Stage::NeedsKickoff,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "kickoff missing or insufficient and code evidence is low".to_owned(),
            },
        );
    }

    if pending_events > 0 {
        return (
            Stage::RefreshNeeded,
            NextAction {
                action_type: ActionType::Refresh,
                target_repos: vec![],
                reason: format!("{pending_events} unconsumed events pending"),
            },
        );
    }

    if !minimum_sufficient {
        return (
            Stage::CommitteePending,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "minimum knowledge requirements not yet satisfied".to_owned(),
            },
        );
    }

    if inputs
        .committees
        .repo_verdicts
        .iter()
        .any(|(_, v)| *v == CommitteeVerdict::Failed)
    {
        return (
            Stage::CommitteeRepoFailed,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "a repo committee reported evidence_valid=false".to_owned(),
            },
        );
    }

    if inputs
        .committees
        .repo_verdicts
        .iter()
        .any(|(_, v)| matches!(v, CommitteeVerdict::Missing | CommitteeVerdict::Stale))
    {
        return (
            Stage::CommitteePending,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "a repo committee is missing or stale".to_owned(),
            },
        );
    }

    if inputs.committees.integration_verdict.is_none() {
        return (
            Stage::CommitteeRepoPassed,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "all repo committees passed; no integration output yet".to_owned(),
            },
        );
    }

    match inputs.committees.integration_verdict {
        Some(CommitteeVerdict::Failed) => (
            Stage::CommitteeIntegrationFailed,
            NextAction {
                action_type: ActionType::Wait,
                target_repos: vec![],
                reason: "integration output evidence_valid=false".to_owned(),
            },
        ),
        Some(CommitteeVerdict::Passed) => {
            let mut reason = "integration output evidence_valid=true".to_owned();
            if !inputs.sufficiency_sufficient {
                reason.push_str(" (SUFFICIENCY_RECOMMENDED)");
            }
            (
                Stage::CommitteePassed,
                NextAction {
                    action_type: ActionType::Wait,
                    target_repos: vec![],
                    reason,
                },
            )
        }
        _ => {
            let mut reason = "all committees passed; ready for writer".to_owned();
            if !inputs.sufficiency_sufficient {
                reason.push_str(" (SUFFICIENCY_RECOMMENDED)");
            }
            (
                Stage::ReadyForWriter,
                NextAction {
                    action_type: ActionType::Wait,
                    target_repos: vec![],
                    reason,
                },
            )
        }
    }
}

/// Run one orchestrator tick.
///
/// # Errors
/// Returns [`OrchestratorError`] only for lock I/O failures; all other
/// failures are captured as `{ok:false}` in the returned result and written
/// to `state.error.json`.
pub fn orchestrate(
    layout: &OpsLayout,
    inputs: TickInputs<'_>,
    config: &LaneAConfig,
    now_unix_ms: i64,
    now_iso: &str,
    expires_iso: &str,
    limit: Option<usize>,
    dry_run: bool,
    scan: &dyn KnowledgeScan,
    chair: &dyn CommitteeChair,
    meetings: &dyn KnowledgeUpdateMeeting,
) -> Result<OrchestrateResult, OrchestratorError> {
    let _ = chair;
    let metadata = LockMetadata {
        lock_name: "lane-a-orchestrate".to_owned(),
        pid: std::process::id(),
        uid: 0,
        user: std::env::var("USER").unwrap_or_default(),
        host: String::new(),
        cwd: layout.root().display().to_string(),
        command: "lanekeeper orchestrate".to_owned(),
        project_root: layout.root().display().to_string(),
        ai_project_root: layout.root().display().to_string(),
    };

    let outcome = match lock::acquire_guarded(
        &layout.lock_file(),
        config.lock.effective_ttl_ms(),
        now_unix_ms,
        now_iso,
        expires_iso,
        metadata,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            write_lock_status(layout, "error", now_iso, dry_run);
            return Err(OrchestratorError::Lock(e));
        }
    };

    let reason = match &outcome {
        GuardedAcquireOutcome::Acquired(_) => "acquired",
        GuardedAcquireOutcome::BrokeStale(_) => "broke_stale",
        GuardedAcquireOutcome::Held(_) => "lock_held",
    };
    write_lock_status(layout, reason, now_iso, dry_run);

    let Some(guard) = outcome.into_guard() else {
        return Ok(OrchestrateResult {
            ok: true,
            skipped: true,
            reason: Some("lock_held".to_owned()),
            next_action: None,
            evidence_state: None,
            logs: vec![],
            message: None,
        });
    };

    let result = run_tick(layout, &inputs, config, now_iso, limit, dry_run, scan, meetings);

    let _ = guard.release();

    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn run_tick(
    layout: &OpsLayout,
    inputs: &TickInputs<'_>,
    config: &LaneAConfig,
    now_iso: &str,
    limit: Option<usize>,
    dry_run: bool,
    scan: &dyn KnowledgeScan,
    meetings: &dyn KnowledgeUpdateMeeting,
) -> OrchestrateResult {
    let active = inputs.registry.active();
    let missing_index: Vec<String> = active
        .iter()
        .filter(|r| !index_present(layout, &r.repo_id))
        .map(|r| r.repo_id.as_str().to_owned())
        .collect();
    let missing_scan: Vec<String> = active
        .iter()
        .filter(|r| index_present(layout, &r.repo_id) && !scan_status_present(layout, &r.repo_id))
        .map(|r| r.repo_id.as_str().to_owned())
        .collect();

    let evidence_level = if !missing_index.is_empty() {
        EvidenceLevel::None
    } else if !missing_scan.is_empty() {
        EvidenceLevel::Partial
    } else {
        EvidenceLevel::Complete
    };

    let low_code_evidence = count_fingerprinted_source_evidence(layout, inputs.registry) < 3;
    let pending = compute_pending_events(layout, now_iso);
    let pending_events = pending.count;

    let (mut stage, mut next_action) = decide_stage(
        evidence_level,
        &missing_index,
        &missing_scan,
        !inputs.minimum_sufficient,
        low_code_evidence,
        pending_events,
        inputs.minimum_sufficient,
        inputs,
        limit,
    );

    if inputs.previous_stage == Some(Stage::DecisionNeeded) && inputs.open_decisions.ids.is_empty() {
        stage = Stage::DecisionAnswered;
        next_action.reason = format!("DECISION_ANSWERED: {}", next_action.reason);
    }

    let mut logs = Vec::new();

    if !dry_run {
        match next_action.action_type {
            ActionType::Index => {
                for repo_id_str in &next_action.target_repos {
                    let Some(entry) = inputs.registry.get(repo_id_str) else { continue };
                    let repo_path = inputs.repos_root.join(&entry.path);
                    match GixRepo::open(&repo_path) {
                        Ok(repo) => {
                            if let Err(e) = indexer::index_repo(
                                &repo,
                                &entry.repo_id,
                                entry.active_branch.as_deref(),
                                layout,
                                false,
                            ) {
                                logs.push(format!("index {repo_id_str} failed: {e}"));
                                break;
                            }
                            invalidate_scan_status(layout, &entry.repo_id);
                        }
                        Err(e) => {
                            logs.push(format!("open {repo_id_str} failed: {e}"));
                            break;
                        }
                    }
                }
            }
            ActionType::Scan => {
                for repo_id_str in &next_action.target_repos {
                    let outcome = scan.run(repo_id_str, 1, 1, dry_run);
                    if !outcome.ok {
                        logs.push(format!("scan {repo_id_str} reported failures: {:?}", outcome.failed));
                        continue;
                    }
                    if let Some(entry) = inputs.registry.get(repo_id_str) {
                        write_scan_status(layout, &entry.repo_id, now_iso);
                    }
                }
            }
            ActionType::Refresh => {
                match crate::refresh::run(layout, inputs.registry, inputs.repos_root, now_iso, true, limit, false) {
                    Ok(report) => {
                        if !report.ok {
                            logs.push("refresh reported per-repo errors".to_owned());
                        }
                    }
                    Err(e) => logs.push(format!("refresh fatal: {e}")),
                }
            }
            ActionType::Question | ActionType::Wait => {}
        }

        if let Err(e) = qa_followup::run(layout, now_iso, false, limit) {
            logs.push(format!("qa follow-up non-fatal error: {e}"));
        }
    }

    let staleness_inputs: Vec<RepoStalenessInput> = active
        .iter()
        .filter_map(|entry| build_staleness_input(inputs.repos_root, layout, entry, &pending, now_iso))
        .collect();
    let repo_snapshots: Vec<_> = staleness_inputs
        .iter()
        .map(|input| staleness::compute_repo_snapshot(input, &config.staleness))
        .collect();
    let system_snapshot = staleness::compute_system_snapshot(&repo_snapshots);

    if !dry_run {
        let mut tracker = load_soft_stale_tracker(layout, now_iso);
        tracker.observe(&repo_snapshots, now_iso);
        let day_key = day_key_from_iso(now_iso);
        match staleness::run_tick_escalations(layout, &mut tracker, &day_key, now_iso, &config.staleness, meetings, dry_run)
        {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    logs.push(format!("soft-stale escalation for {}: {}", outcome.repo_id, outcome.artifact));
                }
            }
            Err(e) => logs.push(format!("staleness escalation error: {e}")),
        }
        persist_soft_stale_tracker(layout, &tracker);

        if system_snapshot.stale {
            let update_meeting_open = meetings.run(MeetingMode::Status, "lane-a", dry_run).meeting_id.is_some();
            if !update_meeting_open {
                write_refresh_hint(
                    layout,
                    now_iso,
                    &system_snapshot.stale_repos.join(","),
                    "system stale and no update meeting open",
                );
            }
        }
    }

    let evidence_state = EvidenceState {
        evidence_level,
        scan_coverage_complete: missing_scan.is_empty(),
        minimum_sufficient: inputs.minimum_sufficient,
        pending_events,
        last_index_at: None,
        last_scan_at: None,
        last_synth_at: None,
        milestone_status: "tracked".to_owned(),
    };

    let state = LaneAState {
        version: 1,
        stage,
        evidence_state: evidence_state.clone(),
        next_action: next_action.clone(),
    };

    if !dry_run {
        persist_state(layout, &state);
    }

    OrchestrateResult {
        ok: true,
        skipped: false,
        reason: None,
        next_action: Some(next_action),
        evidence_state: Some(evidence_state),
        logs,
        message: None,
    }
}

fn persist_state(layout: &OpsLayout, state: &LaneAState) {
    let json = serde_json::to_vec_pretty(state).unwrap_or_default();
    if write_atomic(&layout.state_json(), &json).is_ok() {
        let _ = fs::remove_file(layout.state_error_json());
    }

    let md = format!(
        "# Lane A state\n\n- stage: {:?}\n- evidence_level: {:?}\n- next_action: {:?}\n",
        state.stage, state.evidence_state.evidence_level, state.next_action
    );
    let _ = fs::write(layout.state_md(), md);

    let hint = serde_json::to_vec_pretty(&state.next_action).unwrap_or_default();
    let _ = write_atomic(&layout.next_action_hint_json(), &hint);
}

/// Write a lock status snapshot. Always called, including on the `error`
/// path, so `locks/status/` reflects every acquisition attempt this tick.
fn write_lock_status(layout: &OpsLayout, reason: &str, now_iso: &str, dry_run: bool) {
    if dry_run {
        return;
    }
    let dir = layout.lock_status_dir();
    let _ = fs::create_dir_all(&dir);
    let ts = qa_followup::fs_safe_timestamp(now_iso);
    let path = dir.join(format!("LOCK_STATUS-{ts}.json"));
    let body = serde_json::json!({ "reason": reason, "at": now_iso }).to_string();
    let _ = write_atomic(&path, body.as_bytes());
    prune_capped(&dir, 50);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{LocalUpdateMeeting, NoopKnowledgeScan, PassthroughCommitteeChair};

    const NOW: &str = "2026-01-01T00:00:00Z";

    fn inputs<'a>(registry: &'a Registry, root: &'a Path) -> TickInputs<'a> {
        TickInputs {
            registry,
            repos_root: root,
            open_decisions: OpenDecisions::default(),
            committees: CommitteeSnapshot::default(),
            minimum_sufficient: true,
            sufficiency_sufficient: true,
            previous_stage: None,
        }
    }

    #[test]
    fn cold_start_with_missing_index_selects_needs_index() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let registry_path = dir.path().join("registry.json");
        fs::write(&registry_path, r#"[{"repo_id":"repo-a","path":"repo-a","status":"active"}]"#).unwrap();
        let registry = Registry::load(&registry_path).unwrap();

        let tick_inputs = inputs(&registry, dir.path());
        let result = run_tick(
            &layout,
            &tick_inputs,
            &LaneAConfig::default(),
            NOW,
            None,
            true,
            &NoopKnowledgeScan,
            &LocalUpdateMeeting,
        );
        let action = result.next_action.unwrap();
        assert_eq!(action.action_type, ActionType::Index);
        assert_eq!(action.target_repos, vec!["repo-a".to_owned()]);
    }

    #[test]
    fn open_decision_takes_priority_over_everything() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let registry_path = dir.path().join("registry.json");
        fs::write(&registry_path, "[]").unwrap();
        let registry = Registry::load(&registry_path).unwrap();

        let mut tick_inputs = inputs(&registry, dir.path());
        tick_inputs.open_decisions = OpenDecisions { ids: vec!["DEC-1".to_owned()] };
        let result = run_tick(
            &layout,
            &tick_inputs,
            &LaneAConfig::default(),
            NOW,
            None,
            true,
            &NoopKnowledgeScan,
            &LocalUpdateMeeting,
        );
        assert_eq!(result.next_action.unwrap().action_type, ActionType::Question);
    }

    #[test]
    fn empty_registry_with_committees_passed_reaches_ready_for_writer() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let registry_path = dir.path().join("registry.json");
        fs::write(&registry_path, "[]").unwrap();
        let registry = Registry::load(&registry_path).unwrap();

        let mut tick_inputs = inputs(&registry, dir.path());
        tick_inputs.committees.integration_verdict = Some(CommitteeVerdict::Passed);
        let result = run_tick(
            &layout,
            &tick_inputs,
            &LaneAConfig::default(),
            NOW,
            None,
            true,
            &NoopKnowledgeScan,
            &LocalUpdateMeeting,
        );
        let action = result.next_action.unwrap();
        assert_eq!(action.action_type, ActionType::Wait);
        let _ = PassthroughCommitteeChair;
    }

    #[test]
    fn non_dry_run_tick_computes_staleness_and_writes_refresh_hint() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let registry_path = dir.path().join("registry.json");
        fs::write(&registry_path, "[]").unwrap();
        let registry = Registry::load(&registry_path).unwrap();

        let mut tick_inputs = inputs(&registry, dir.path());
        tick_inputs.committees.integration_verdict = Some(CommitteeVerdict::Passed);
        let result = run_tick(
            &layout,
            &tick_inputs,
            &LaneAConfig::default(),
            NOW,
            None,
            false,
            &NoopKnowledgeScan,
            &LocalUpdateMeeting,
        );
        assert!(result.ok);
        assert!(layout.soft_stale_tracker_json().exists());
    }
}
