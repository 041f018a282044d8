//! Refresh-from-events consumer (§4.3): applies newly appended events to
//! knowledge state by re-indexing impacted repos and marking committees stale.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use lanekeeper_git::GixRepo;

use crate::atomic::write_atomic;
use crate::checkpoint::{self, CheckpointError};
use crate::events::KnowledgeEvent;
use crate::ids::{ConsumerName, SegmentKey};
use crate::indexer::{self, IndexError};
use crate::log::{self, AnchorError};
use crate::paths::OpsLayout;
use crate::registry::Registry;

fn consumer_name() -> ConsumerName {
    ConsumerName::new("refresh-from-events").expect("literal consumer name is valid")
}

/// A per-repo failure encountered while refreshing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRefreshError {
    pub repo_id: String,
    pub message: String,
}

/// The committee-staleness marker written for a repo (and for `system`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleMarker {
    pub reason: String,
    pub marked_at: String,
}

/// Recent-events rollup written alongside the knowledge repo (§4.3 step 6).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsSummary {
    pub counts_by_type: BTreeMap<String, u64>,
    pub counts_by_scope: BTreeMap<String, u64>,
    pub counts_by_repo: BTreeMap<String, u64>,
    pub recent_events: Vec<KnowledgeEvent>,
}

/// Report for one `Run` of the refresh consumer, persisted as
/// `knowledge-refresh-from-events.report.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub ok: bool,
    pub events_consumed: usize,
    pub duplicate_event_ids: Vec<String>,
    pub impacted_repos: Vec<String>,
    pub indexed_repos: Vec<String>,
    pub errors: Vec<RepoRefreshError>,
}

/// A fatal error that aborts the refresh entirely.
#[derive(Debug)]
pub enum RefreshError {
    Checkpoint(CheckpointError),
    Anchor(AnchorError),
    /// The persisted checkpoint has an event-id anchor with no segment recorded.
    MissingAnchorSegment,
    /// A report or summary write failed.
    Write { path: String, source: std::io::Error },
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkpoint(e) => write!(f, "{e}"),
            Self::Anchor(e) => write!(f, "{e}"),
            Self::MissingAnchorSegment => {
                write!(f, "checkpoint has last_processed_event_id but no last_processed_segment")
            }
            Self::Write { path, source } => write!(f, "failed to write {path}: {source}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Run the refresh-from-events consumer once.
///
/// `stop_on_error` halts on the first repo-level failure; otherwise errors
/// accumulate in the report and `ok` is false if any occurred.
///
/// # Errors
/// Returns [`RefreshError`] for checkpoint I/O failures or anchor corruption
/// (anchor segment/event not found) — these are fatal per §4.3 step 1.
pub fn run(
    layout: &OpsLayout,
    registry: &Registry,
    repos_root: &Path,
    now: &str,
    stop_on_error: bool,
    max_events: Option<usize>,
    dry_run: bool,
) -> Result<RefreshReport, RefreshError> {
    let consumer = consumer_name();
    let checkpoint = checkpoint::read(layout, &consumer, now).map_err(RefreshError::Checkpoint)?;

    let lines = match (&checkpoint.last_processed_segment, &checkpoint.last_processed_event_id) {
        (Some(segment), Some(event_id)) => {
            log::read_forward_from_event_id(layout, segment, event_id).map_err(RefreshError::Anchor)?
        }
        (None, None) => {
            // Never processed: read everything from the start.
            log::read_forward_from_offset(layout, None, 0).map_err(|e| RefreshError::Anchor(AnchorError::Log(e)))?
        }
        _ => return Err(RefreshError::MissingAnchorSegment),
    };

    let lines = if let Some(limit) = max_events {
        lines.into_iter().take(limit).collect::<Vec<_>>()
    } else {
        lines
    };

    let mut report = RefreshReport {
        ok: true,
        ..RefreshReport::default()
    };

    let mut seen_ids = BTreeSet::new();
    let mut impacted: BTreeSet<String> = BTreeSet::new();
    let mut last_position: Option<(SegmentKey, String)> = None;
    let mut consumed = 0usize;
    let mut recent_events: Vec<KnowledgeEvent> = Vec::new();

    for line in &lines {
        let event = match KnowledgeEvent::from_line(&line.text) {
            Ok(event) => event,
            Err(_) => continue,
        };
        if !seen_ids.insert(event.event_id.clone()) {
            report.duplicate_event_ids.push(event.event_id.clone());
            continue;
        }
        if let Some(repo_id) = &event.repo_id {
            impacted.insert(repo_id.as_str().to_owned());
        }
        consumed += 1;
        last_position = Some((line.segment.clone(), event.event_id.clone()));
        recent_events.push(event);
    }
    report.events_consumed = consumed;
    report.impacted_repos = impacted.iter().cloned().collect();

    for repo_id in &impacted {
        match refresh_one_repo(layout, registry, repos_root, repo_id, now, dry_run) {
            Ok(()) => report.indexed_repos.push(repo_id.clone()),
            Err(message) => {
                report.ok = false;
                report.errors.push(RepoRefreshError {
                    repo_id: repo_id.clone(),
                    message,
                });
                if stop_on_error {
                    break;
                }
            }
        }
    }

    if !dry_run {
        write_report(layout, &report)?;

        if !report.indexed_repos.is_empty() {
            let summary_path = layout.events_summary_json();
            let source_index_hash = compute_source_index_hash(layout, registry);
            recompute_events_summary_if_changed(&summary_path, &source_index_hash, &recent_events, false)
                .map_err(|source| RefreshError::Write {
                    path: summary_path.display().to_string(),
                    source,
                })?;
        }
    }

    let can_advance = consumed > 0 && (report.errors.is_empty() || !stop_on_error);
    if can_advance {
        if let Some((segment, event_id)) = last_position {
            checkpoint::write_event_id(layout, &consumer, &segment, &event_id, now, dry_run)
                .map_err(RefreshError::Checkpoint)?;
        }
    }

    Ok(report)
}

fn refresh_one_repo(
    layout: &OpsLayout,
    registry: &Registry,
    repos_root: &Path,
    repo_id: &str,
    now: &str,
    dry_run: bool,
) -> Result<(), String> {
    let entry = registry
        .get(repo_id)
        .ok_or_else(|| format!("unknown repo_id in registry: {repo_id}"))?;
    let repo_path = repos_root.join(&entry.path);
    if !repo_path.exists() {
        return Err(format!("repo path does not exist: {}", repo_path.display()));
    }

    let git_repo = GixRepo::open(&repo_path).map_err(|e| e.to_string())?;
    let repo_id_typed = entry.repo_id.clone();
    indexer::index_repo(
        &git_repo,
        &repo_id_typed,
        entry.active_branch.as_deref(),
        layout,
        dry_run,
    )
    .map_err(|e: IndexError| e.to_string())?;

    mark_committee_stale(layout, repo_id, now, dry_run).map_err(|e| e.to_string())?;
    mark_committee_stale(layout, "system", now, dry_run).map_err(|e| e.to_string())?;
    Ok(())
}

fn mark_committee_stale(
    layout: &OpsLayout,
    scope: &str,
    now: &str,
    dry_run: bool,
) -> std::io::Result<()> {
    if dry_run {
        return Ok(());
    }
    let path = layout.logs_dir().join(format!("{scope}.committee.STALE.json"));
    let marker = StaleMarker {
        reason: "refresh_from_events".to_owned(),
        marked_at: now.to_owned(),
    };
    let json = serde_json::to_vec_pretty(&marker).unwrap_or_default();
    write_atomic(&path, &json)
}

/// Digest of every active repo's persisted index head, so the events summary
/// is only recomputed when at least one repo's index has actually moved.
fn compute_source_index_hash(layout: &OpsLayout, registry: &Registry) -> String {
    let mut parts: Vec<String> = registry
        .active()
        .iter()
        .filter_map(|entry| {
            let text = fs::read_to_string(layout.repo_index_json(&entry.repo_id)).ok()?;
            let index: indexer::RepoIndex = serde_json::from_str(&text).ok()?;
            Some(format!("{}:{}", entry.repo_id, index.head_sha))
        })
        .collect();
    parts.sort();
    terseid::hash(parts.join(",").as_bytes(), 16)
}

fn write_report(layout: &OpsLayout, report: &RefreshReport) -> Result<(), RefreshError> {
    let json_path = layout.logs_dir().join("knowledge-refresh-from-events.report.json");
    let json = serde_json::to_vec_pretty(report).unwrap_or_default();
    write_atomic(&json_path, &json).map_err(|source| RefreshError::Write {
        path: json_path.display().to_string(),
        source,
    })?;

    let md_path = layout.logs_dir().join("knowledge-refresh-from-events.report.md");
    let mut md = String::new();
    md.push_str("# Refresh from events\n\n");
    md.push_str(&format!("- events_consumed: {}\n", report.events_consumed));
    md.push_str(&format!("- impacted_repos: {:?}\n", report.impacted_repos));
    md.push_str(&format!("- indexed_repos: {:?}\n", report.indexed_repos));
    md.push_str(&format!("- errors: {}\n", report.errors.len()));
    let _ = fs::write(&md_path, md);
    Ok(())
}

/// Recompute `events-summary.json` when `source_index_hash` differs from the
/// previously recorded one. Returns `true` if it was recomputed and written.
///
/// # Errors
/// Returns an error if the write fails.
pub fn recompute_events_summary_if_changed(
    summary_path: &Path,
    source_index_hash: &str,
    recent_events: &[KnowledgeEvent],
    dry_run: bool,
) -> std::io::Result<bool> {
    #[derive(Serialize, Deserialize)]
    struct OnDisk {
        source_index_hash: String,
        #[serde(flatten)]
        summary: EventsSummary,
    }

    if let Ok(existing) = fs::read_to_string(summary_path) {
        if let Ok(on_disk) = serde_json::from_str::<OnDisk>(&existing) {
            if on_disk.source_index_hash == source_index_hash {
                return Ok(false);
            }
        }
    }

    let mut counts_by_type = BTreeMap::new();
    let mut counts_by_scope = BTreeMap::new();
    let mut counts_by_repo = BTreeMap::new();
    for event in recent_events {
        *counts_by_type.entry(event.event_type.as_str().to_owned()).or_insert(0) += 1;
        *counts_by_scope.entry(event.scope.clone()).or_insert(0) += 1;
        if let Some(repo_id) = &event.repo_id {
            *counts_by_repo.entry(repo_id.as_str().to_owned()).or_insert(0) += 1;
        }
    }

    let mut sorted_events = recent_events.to_vec();
    sorted_events.sort_by(|a, b| (&a.timestamp, &a.event_id).cmp(&(&b.timestamp, &b.event_id)));
    let last_50: Vec<_> = sorted_events.into_iter().rev().take(50).collect();

    let on_disk = OnDisk {
        source_index_hash: source_index_hash.to_owned(),
        summary: EventsSummary {
            counts_by_type,
            counts_by_scope,
            counts_by_repo,
            recent_events: last_50,
        },
    };

    if dry_run {
        return Ok(true);
    }
    let json = serde_json::to_vec_pretty(&on_disk).unwrap_or_default();
    write_atomic(summary_path, &json)?;
    Ok(true)
}
