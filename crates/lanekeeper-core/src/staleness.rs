//! Staleness & soft-stale escalation (§4.5).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::collaborators::{KnowledgeUpdateMeeting, MeetingMode};
use crate::config::{EscalateMode, StalenessConfig};
use crate::lock::parse_epoch_ms;
use crate::paths::OpsLayout;

/// Closed vocabulary of staleness reason codes.
pub const REPO_HEAD_DRIFT: &str = "repo_head_drift";
pub const UNCONSUMED_MERGE_EVENTS: &str = "unconsumed_merge_events";
pub const SCAN_OLDER_THAN_WINDOW: &str = "scan_older_than_window";

/// Inputs needed to compute one repo's staleness snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoStalenessInput {
    pub repo_id: String,
    pub repo_head_sha: String,
    pub last_scanned_head_sha: Option<String>,
    /// ISO-8601 UTC timestamp of the repo's last scan, if any.
    pub last_scan_time: Option<String>,
    /// ISO-8601 UTC timestamp of the most recent unconsumed merge event touching this repo, if any.
    pub last_merge_event_time: Option<String>,
    pub has_unconsumed_merge_events: bool,
    pub scan_age_hours: Option<u32>,
}

/// Per-repo staleness snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStalenessSnapshot {
    pub repo_id: String,
    pub stale: bool,
    pub hard_stale: bool,
    pub reasons: Vec<String>,
    pub last_scan_time: Option<String>,
    pub last_merge_event_time: Option<String>,
    pub repo_head_sha: String,
    pub last_scanned_head_sha: Option<String>,
}

/// Compute one repo's staleness snapshot. `hard_stale` is reserved for head
/// drift (the repo has moved past what was last scanned); the other reasons
/// are soft-stale signals.
#[must_use]
pub fn compute_repo_snapshot(
    input: &RepoStalenessInput,
    config: &StalenessConfig,
) -> RepoStalenessSnapshot {
    let mut reasons = BTreeSet::new();

    let head_drifted = match &input.last_scanned_head_sha {
        Some(scanned) => scanned != &input.repo_head_sha,
        None => true,
    };
    if head_drifted {
        reasons.insert(REPO_HEAD_DRIFT.to_owned());
    }
    if input.has_unconsumed_merge_events {
        reasons.insert(UNCONSUMED_MERGE_EVENTS.to_owned());
    }
    if let Some(age) = input.scan_age_hours {
        if age >= config.scan_older_than_window_hours {
            reasons.insert(SCAN_OLDER_THAN_WINDOW.to_owned());
        }
    } else {
        reasons.insert(SCAN_OLDER_THAN_WINDOW.to_owned());
    }

    let hard_stale = head_drifted;
    let stale = hard_stale || !reasons.is_empty();

    RepoStalenessSnapshot {
        repo_id: input.repo_id.clone(),
        stale,
        hard_stale,
        reasons: reasons.into_iter().collect(),
        last_scan_time: input.last_scan_time.clone(),
        last_merge_event_time: input.last_merge_event_time.clone(),
        repo_head_sha: input.repo_head_sha.clone(),
        last_scanned_head_sha: input.last_scanned_head_sha.clone(),
    }
}

/// Union of repo snapshots into a system-wide view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStalenessSnapshot {
    pub stale: bool,
    pub hard_stale_repos: Vec<String>,
    pub stale_repos: Vec<String>,
}

#[must_use]
pub fn compute_system_snapshot(repos: &[RepoStalenessSnapshot]) -> SystemStalenessSnapshot {
    let mut hard_stale_repos: BTreeSet<String> = BTreeSet::new();
    let mut stale_repos: BTreeSet<String> = BTreeSet::new();
    for repo in repos {
        if repo.hard_stale {
            hard_stale_repos.insert(repo.repo_id.clone());
        }
        if repo.stale {
            stale_repos.insert(repo.repo_id.clone());
        }
    }
    SystemStalenessSnapshot {
        stale: !stale_repos.is_empty(),
        hard_stale_repos: hard_stale_repos.into_iter().collect(),
        stale_repos: stale_repos.into_iter().collect(),
    }
}

/// One escalation recorded against a tracked repo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub at: String,
    pub mode: EscalateMode,
    pub artifact: String,
}

/// One repo's soft-stale tracking entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEntry {
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub current_reason_codes: Vec<String>,
    pub escalations: Vec<Escalation>,
}

/// `soft_stale_tracker.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftStaleTracker {
    pub version: u32,
    pub project_root: String,
    pub updated_at: String,
    pub repos: BTreeMap<String, TrackerEntry>,
}

impl SoftStaleTracker {
    #[must_use]
    pub fn new(project_root: &str, now: &str) -> Self {
        Self {
            version: 1,
            project_root: project_root.to_owned(),
            updated_at: now.to_owned(),
            repos: BTreeMap::new(),
        }
    }

    /// Apply one observation pass over `snapshots` (§4.5): upsert soft-stale
    /// (stale-but-not-hard) repos, remove repos that are no longer soft-stale
    /// or that have become hard-stale.
    pub fn observe(&mut self, snapshots: &[RepoStalenessSnapshot], now: &str) {
        let soft_stale_ids: BTreeSet<&str> = snapshots
            .iter()
            .filter(|s| s.stale && !s.hard_stale)
            .map(|s| s.repo_id.as_str())
            .collect();

        for snapshot in snapshots {
            if soft_stale_ids.contains(snapshot.repo_id.as_str()) {
                let entry = self
                    .repos
                    .entry(snapshot.repo_id.clone())
                    .or_insert_with(|| TrackerEntry {
                        first_seen_at: now.to_owned(),
                        last_seen_at: now.to_owned(),
                        current_reason_codes: vec![],
                        escalations: vec![],
                    });
                entry.last_seen_at = now.to_owned();
                entry.current_reason_codes = snapshot.reasons.clone();
            } else {
                self.repos.remove(&snapshot.repo_id);
            }
        }
        self.updated_at = now.to_owned();
    }
}

/// Per-UTC-day escalation counter, bounded to a 30-day retention window.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    pub version: u32,
    pub count: u32,
    pub artifacts: Vec<String>,
}

/// An error persisting staleness state.
#[derive(Debug)]
pub enum StalenessError {
    Write { path: String, source: std::io::Error },
}

impl fmt::Display for StalenessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write { path, source } => write!(f, "failed to write {path}: {source}"),
        }
    }
}

impl std::error::Error for StalenessError {}

/// One escalation decision made this tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationOutcome {
    pub repo_id: String,
    pub artifact: String,
}

/// Run the escalation rule once for all currently-soft-stale repos,
/// respecting the per-day cap and per-repo-per-mode-per-day uniqueness.
///
/// `now_minutes_since_first_seen` supplies each repo's elapsed soft-stale
/// age in minutes (computed by the caller, which owns wall-clock access).
/// `open_decision_packet` and `open_update_meeting` are the artifact-writing
/// callbacks for the two escalation modes.
///
/// # Errors
/// Returns an error if persisting the tracker or counter fails.
#[allow(clippy::too_many_arguments)]
pub fn run_escalations(
    layout: &OpsLayout,
    tracker: &mut SoftStaleTracker,
    day_key: &str,
    now: &str,
    config: &StalenessConfig,
    elapsed_minutes: impl Fn(&str) -> u32,
    mut write_artifact: impl FnMut(&str, EscalateMode) -> Result<String, String>,
    dry_run: bool,
) -> Result<Vec<EscalationOutcome>, StalenessError> {
    let mut counter = read_daily_counter(layout, day_key);
    let mut outcomes = Vec::new();

    let repo_ids: Vec<String> = tracker.repos.keys().cloned().collect();
    for repo_id in repo_ids {
        if counter.count >= config.escalate_cap_per_day {
            break;
        }
        let already_escalated_today = tracker.repos[&repo_id]
            .escalations
            .iter()
            .any(|e| e.at.starts_with(day_key) && e.mode == config.escalate_mode);
        if already_escalated_today {
            continue;
        }
        if elapsed_minutes(&repo_id) < config.escalate_after_minutes {
            continue;
        }

        match write_artifact(&repo_id, config.escalate_mode) {
            Ok(artifact) => {
                tracker
                    .repos
                    .get_mut(&repo_id)
                    .expect("repo_id was just read from tracker.repos.keys()")
                    .escalations
                    .push(Escalation {
                        at: now.to_owned(),
                        mode: config.escalate_mode,
                        artifact: artifact.clone(),
                    });
                counter.count += 1;
                counter.artifacts.push(artifact.clone());
                outcomes.push(EscalationOutcome { repo_id, artifact });
            }
            Err(_) => continue,
        }
    }

    if !dry_run {
        persist_tracker(layout, tracker)?;
        persist_daily_counter(layout, day_key, &counter)?;
        prune_old_counters(layout, day_key);
    }

    Ok(outcomes)
}

/// Minutes elapsed between two ISO-8601 UTC timestamps, floored at zero.
#[must_use]
pub fn minutes_since(earlier_iso: &str, now_iso: &str) -> u32 {
    let (Some(earlier), Some(now)) = (parse_epoch_ms(earlier_iso), parse_epoch_ms(now_iso)) else {
        return 0;
    };
    u32::try_from((now - earlier).max(0) / 60_000).unwrap_or(u32::MAX)
}

/// Markdown banner prepended to escalation artifacts when
/// `StalenessConfig::banner_enabled` is set.
fn soft_stale_banner(repo_id: &str, reasons: &[String]) -> String {
    format!(
        "> **Soft-stale escalation** — `{repo_id}` has been soft-stale (reasons: {}) past the escalation threshold.\n\n",
        reasons.join(", ")
    )
}

/// Write a `decision_packet` escalation artifact: a standalone markdown file
/// under `decision_packets/`, named `DP-SOFT-STALE-{YYYYMMDD}_{hex8}.md`.
fn write_decision_packet(
    layout: &OpsLayout,
    repo_id: &str,
    reasons: &[String],
    day_key: &str,
    config: &StalenessConfig,
) -> Result<String, String> {
    let dir = layout.decision_packets_dir();
    fs::create_dir_all(&dir).map_err(|e| e.to_string())?;

    let mut suffix = [0u8; 4];
    rand::rng().fill_bytes(&mut suffix);
    let hex8: String = suffix.iter().map(|b| format!("{b:02x}")).collect();
    let path = dir.join(format!("DP-SOFT-STALE-{day_key}_{hex8}.md"));

    let mut body = String::new();
    if config.banner_enabled {
        body.push_str(&soft_stale_banner(repo_id, reasons));
    }
    body.push_str(&format!(
        "# Soft-stale decision packet\n\n- repo_id: {repo_id}\n- reasons: {reasons:?}\n"
    ));

    write_atomic(&path, body.as_bytes()).map_err(|e| e.to_string())?;
    Ok(path.display().to_string())
}

/// Write an `update_meeting` escalation artifact: open a repo-scoped meeting
/// via the meetings collaborator and drop a `SOFT_STALE_NOTICE.md` in it.
fn open_update_meeting_notice(
    layout: &OpsLayout,
    meetings: &dyn KnowledgeUpdateMeeting,
    repo_id: &str,
    reasons: &[String],
    config: &StalenessConfig,
    dry_run: bool,
) -> Result<String, String> {
    let scope = format!("repo:{repo_id}");
    let outcome = meetings.run(MeetingMode::Start, &scope, dry_run);
    if !outcome.ok {
        return Err(format!("update-meeting collaborator reported failure for {scope}"));
    }
    let meeting_id = outcome
        .meeting_id
        .ok_or_else(|| "update-meeting collaborator returned no meeting_id".to_owned())?;

    let dir = layout.meetings_dir().join(&meeting_id);
    let notice_path = dir.join("SOFT_STALE_NOTICE.md");
    if !dry_run {
        fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        let mut body = String::new();
        if config.banner_enabled {
            body.push_str(&soft_stale_banner(repo_id, reasons));
        }
        body.push_str(&format!(
            "# Soft-stale notice\n\n- repo_id: {repo_id}\n- meeting_id: {meeting_id}\n- reasons: {reasons:?}\n"
        ));
        write_atomic(&notice_path, body.as_bytes()).map_err(|e| e.to_string())?;
    }
    Ok(notice_path.display().to_string())
}

/// Run the soft-stale escalation rule once, using the real artifact writers
/// for the configured [`EscalateMode`] (§4.5). Intended for the orchestrator
/// tick; `run_escalations` remains the generic, callback-driven core.
///
/// # Errors
/// Returns an error if persisting the tracker or counter fails.
pub fn run_tick_escalations(
    layout: &OpsLayout,
    tracker: &mut SoftStaleTracker,
    day_key: &str,
    now: &str,
    config: &StalenessConfig,
    meetings: &dyn KnowledgeUpdateMeeting,
    dry_run: bool,
) -> Result<Vec<EscalationOutcome>, StalenessError> {
    let reasons_by_repo: BTreeMap<String, Vec<String>> = tracker
        .repos
        .iter()
        .map(|(repo_id, entry)| (repo_id.clone(), entry.current_reason_codes.clone()))
        .collect();
    let elapsed_by_repo: BTreeMap<String, u32> = tracker
        .repos
        .iter()
        .map(|(repo_id, entry)| (repo_id.clone(), minutes_since(&entry.first_seen_at, now)))
        .collect();

    run_escalations(
        layout,
        tracker,
        day_key,
        now,
        config,
        |repo_id| elapsed_by_repo.get(repo_id).copied().unwrap_or(0),
        |repo_id, mode| {
            let reasons = reasons_by_repo.get(repo_id).cloned().unwrap_or_default();
            match mode {
                EscalateMode::DecisionPacket => write_decision_packet(layout, repo_id, &reasons, day_key, config),
                EscalateMode::UpdateMeeting => {
                    open_update_meeting_notice(layout, meetings, repo_id, &reasons, config, dry_run)
                }
            }
        },
        dry_run,
    )
}

fn read_daily_counter(layout: &OpsLayout, day_key: &str) -> DailyCounter {
    let path = layout.soft_stale_escalations_json(day_key);
    fs::read_to_string(&path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| DailyCounter {
            version: 1,
            count: 0,
            artifacts: vec![],
        })
}

fn persist_daily_counter(
    layout: &OpsLayout,
    day_key: &str,
    counter: &DailyCounter,
) -> Result<(), StalenessError> {
    let path = layout.soft_stale_escalations_json(day_key);
    let json = serde_json::to_vec_pretty(counter).unwrap_or_default();
    write_atomic(&path, &json).map_err(|source| StalenessError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn persist_tracker(layout: &OpsLayout, tracker: &SoftStaleTracker) -> Result<(), StalenessError> {
    let path = layout.soft_stale_tracker_json();
    let json = serde_json::to_vec_pretty(tracker).unwrap_or_default();
    write_atomic(&path, &json).map_err(|source| StalenessError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Remove per-day counter files older than 30 days, judged lexicographically
/// against `current_day_key` (both are `YYYYMMDD`, so string comparison
/// tracks calendar order).
fn prune_old_counters(layout: &OpsLayout, current_day_key: &str) {
    let Ok(entries) = fs::read_dir(layout.staleness_dir()) else {
        return;
    };
    const RETENTION_DAYS: i64 = 30;
    let Some(cutoff) = day_key_minus_days(current_day_key, RETENTION_DAYS) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(day) = name
            .strip_prefix("soft_stale_escalations_")
            .and_then(|s| s.strip_suffix(".json"))
        else {
            continue;
        };
        if day < cutoff.as_str() {
            let _ = fs::remove_file(entry.path());
        }
    }
}

fn day_key_minus_days(day_key: &str, days: i64) -> Option<String> {
    let year: i64 = day_key.get(0..4)?.parse().ok()?;
    let month: i64 = day_key.get(4..6)?.parse().ok()?;
    let day: i64 = day_key.get(6..8)?.parse().ok()?;
    let epoch_day = days_from_civil(year, month, day) - days;
    let (y, m, d) = civil_from_days(epoch_day);
    Some(format!("{y:04}{m:02}{d:02}"))
}

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StalenessConfig {
        StalenessConfig::default()
    }

    fn fresh_input(repo_id: &str) -> RepoStalenessInput {
        RepoStalenessInput {
            repo_id: repo_id.to_owned(),
            repo_head_sha: "a".repeat(40),
            last_scanned_head_sha: Some("a".repeat(40)),
            last_scan_time: Some("2026-08-01T00:00:00Z".to_owned()),
            last_merge_event_time: None,
            has_unconsumed_merge_events: false,
            scan_age_hours: Some(1),
        }
    }

    #[test]
    fn fresh_repo_is_not_stale() {
        let snapshot = compute_repo_snapshot(&fresh_input("repo-a"), &config());
        assert!(!snapshot.stale);
        assert!(!snapshot.hard_stale);
    }

    #[test]
    fn head_drift_is_hard_stale() {
        let mut input = fresh_input("repo-a");
        input.repo_head_sha = "b".repeat(40);
        let snapshot = compute_repo_snapshot(&input, &config());
        assert!(snapshot.hard_stale);
        assert!(snapshot.stale);
        assert!(snapshot.reasons.contains(&REPO_HEAD_DRIFT.to_owned()));
    }

    #[test]
    fn unconsumed_events_is_soft_stale_only() {
        let mut input = fresh_input("repo-a");
        input.has_unconsumed_merge_events = true;
        let snapshot = compute_repo_snapshot(&input, &config());
        assert!(snapshot.stale);
        assert!(!snapshot.hard_stale);
        assert!(snapshot.reasons.contains(&UNCONSUMED_MERGE_EVENTS.to_owned()));
    }

    #[test]
    fn system_snapshot_unions_repo_snapshots() {
        let stale = compute_repo_snapshot(
            &{
                let mut i = fresh_input("repo-b");
                i.has_unconsumed_merge_events = true;
                i
            },
            &config(),
        );
        let clean = compute_repo_snapshot(&fresh_input("repo-a"), &config());
        let system = compute_system_snapshot(&[clean, stale]);
        assert!(system.stale);
        assert_eq!(system.stale_repos, vec!["repo-b".to_owned()]);
        assert!(system.hard_stale_repos.is_empty());
    }

    #[test]
    fn tracker_upserts_soft_stale_and_removes_cleared() {
        let mut tracker = SoftStaleTracker::new("/proj", "t0");
        let soft = compute_repo_snapshot(
            &{
                let mut i = fresh_input("repo-a");
                i.has_unconsumed_merge_events = true;
                i
            },
            &config(),
        );
        tracker.observe(&[soft.clone()], "t0");
        assert!(tracker.repos.contains_key("repo-a"));
        assert_eq!(tracker.repos["repo-a"].first_seen_at, "t0");

        tracker.observe(&[soft], "t1");
        assert_eq!(tracker.repos["repo-a"].first_seen_at, "t0");
        assert_eq!(tracker.repos["repo-a"].last_seen_at, "t1");

        let clean = compute_repo_snapshot(&fresh_input("repo-a"), &config());
        tracker.observe(&[clean], "t2");
        assert!(!tracker.repos.contains_key("repo-a"));
    }

    #[test]
    fn escalation_cap_per_day_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let mut tracker = SoftStaleTracker::new("/proj", "t0");
        for i in 0..5 {
            tracker.repos.insert(
                format!("repo-{i}"),
                TrackerEntry {
                    first_seen_at: "t0".to_owned(),
                    last_seen_at: "t0".to_owned(),
                    current_reason_codes: vec![UNCONSUMED_MERGE_EVENTS.to_owned()],
                    escalations: vec![],
                },
            );
        }
        let mut cfg = config();
        cfg.escalate_cap_per_day = 3;
        cfg.escalate_after_minutes = 0;

        let outcomes = run_escalations(
            &layout,
            &mut tracker,
            "20260801",
            "2026-08-01T04:00:00Z",
            &cfg,
            |_| 999,
            |repo_id, _mode| Ok(format!("artifact-for-{repo_id}")),
            false,
        )
        .unwrap();
        assert_eq!(outcomes.len(), 3);
    }

    #[test]
    fn same_repo_not_escalated_twice_same_day_same_mode() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let mut tracker = SoftStaleTracker::new("/proj", "t0");
        tracker.repos.insert(
            "repo-a".to_owned(),
            TrackerEntry {
                first_seen_at: "t0".to_owned(),
                last_seen_at: "t0".to_owned(),
                current_reason_codes: vec![],
                escalations: vec![Escalation {
                    at: "20260801T010000".to_owned(),
                    mode: EscalateMode::UpdateMeeting,
                    artifact: "existing".to_owned(),
                }],
            },
        );
        let cfg = config();

        let outcomes = run_escalations(
            &layout,
            &mut tracker,
            "20260801",
            "2026-08-01T04:00:00Z",
            &cfg,
            |_| 999,
            |repo_id, _mode| Ok(format!("artifact-for-{repo_id}")),
            false,
        )
        .unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn day_key_minus_days_crosses_month_boundary() {
        assert_eq!(day_key_minus_days("20260101", 1).unwrap(), "20251231");
        assert_eq!(day_key_minus_days("20260801", 30).unwrap(), "20260702");
    }

    #[test]
    fn minutes_since_floors_at_zero_on_bad_input() {
        assert_eq!(minutes_since("not-a-date", "2026-08-01T00:00:00Z"), 0);
        assert_eq!(
            minutes_since("2026-08-01T00:00:00Z", "2026-08-01T00:03:00Z"),
            3
        );
    }

    #[test]
    fn decision_packet_writer_produces_named_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let artifact = write_decision_packet(
            &layout,
            "repo-a",
            &[UNCONSUMED_MERGE_EVENTS.to_owned()],
            "20260801",
            &config(),
        )
        .unwrap();
        assert!(artifact.contains("DP-SOFT-STALE-20260801_"));
        assert!(artifact.ends_with(".md"));
        let body = fs::read_to_string(&artifact).unwrap();
        assert!(body.contains("repo-a"));
        assert!(body.contains("Soft-stale escalation"));
    }

    #[test]
    fn update_meeting_writer_opens_meeting_and_writes_notice() {
        use crate::collaborators::LocalUpdateMeeting;

        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let meetings = LocalUpdateMeeting;
        let artifact = open_update_meeting_notice(
            &layout,
            &meetings,
            "repo-a",
            &[UNCONSUMED_MERGE_EVENTS.to_owned()],
            &config(),
            false,
        )
        .unwrap();
        assert!(artifact.ends_with("SOFT_STALE_NOTICE.md"));
        assert!(layout.meetings_dir().join("UM-repo:repo-a").join("SOFT_STALE_NOTICE.md").exists());
    }

    #[test]
    fn run_tick_escalations_writes_real_artifact_for_soft_stale_repo() {
        use crate::collaborators::LocalUpdateMeeting;

        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let mut tracker = SoftStaleTracker::new("/proj", "2026-08-01T00:00:00Z");
        tracker.repos.insert(
            "repo-a".to_owned(),
            TrackerEntry {
                first_seen_at: "2026-08-01T00:00:00Z".to_owned(),
                last_seen_at: "2026-08-01T04:00:00Z".to_owned(),
                current_reason_codes: vec![UNCONSUMED_MERGE_EVENTS.to_owned()],
                escalations: vec![],
            },
        );
        let meetings = LocalUpdateMeeting;

        let outcomes = run_tick_escalations(
            &layout,
            &mut tracker,
            "20260801",
            "2026-08-01T04:00:00Z",
            &config(),
            &meetings,
            false,
        )
        .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(std::path::Path::new(&outcomes[0].artifact).exists());
        assert_eq!(tracker.repos["repo-a"].escalations.len(), 1);
    }
}
