//! QA-merge follow-up consumer (§4.2): emits a Lane B intake for merges
//! obliged to add E2E coverage that didn't touch an E2E test.

use std::fmt;
use std::fs;

use crate::atomic::write_atomic;
use crate::checkpoint::{self, CheckpointError};
use crate::events::KnowledgeEvent;
use crate::ids::{ConsumerName, SegmentKey};
use crate::log::{self, EventLogError, LogLine};
use crate::paths::OpsLayout;

/// Classification of a touched path, per the deterministic predicate in §4.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    E2e,
    Integration,
    Unit,
    Other,
}

/// Classify a single path by the rules in §4.2: e2e beats integration beats unit.
#[must_use]
pub fn classify_path(path: &str) -> PathKind {
    if path.contains("/cypress/")
        || path.contains("/playwright/")
        || path.contains("/e2e/")
        || path.starts_with("e2e/")
    {
        PathKind::E2e
    } else if path.contains("/integration/") || path.contains("/itest/") || path.contains(".int.test.") {
        PathKind::Integration
    } else if path.contains("__tests__/")
        || path.contains("test/")
        || path.contains("tests/")
        || path.contains(".test.")
        || path.contains(".spec.")
        || path.ends_with(".test.ts")
        || path.ends_with(".spec.ts")
    {
        PathKind::Unit
    } else {
        PathKind::Other
    }
}

fn has_e2e_edit(paths: &[String]) -> bool {
    paths.iter().any(|p| classify_path(p) == PathKind::E2e)
}

/// A created intake file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedIntake {
    pub event_id: String,
    pub intake_path: String,
}

/// Result of one `Run` of the follow-up consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub ok: bool,
    pub processed_lines: usize,
    pub merge_events_seen: usize,
    pub created: Vec<CreatedIntake>,
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

/// An error that aborts the run outright (checkpoint I/O only — malformed
/// event lines are warnings, not errors, per §4.2).
#[derive(Debug)]
pub enum FollowupError {
    Checkpoint(CheckpointError),
    Log(EventLogError),
}

impl fmt::Display for FollowupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkpoint(e) => write!(f, "{e}"),
            Self::Log(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FollowupError {}

fn consumer_name() -> ConsumerName {
    ConsumerName::new("qa-merge-followups").expect("literal consumer name is valid")
}

/// Run the QA-merge follow-up consumer once.
///
/// # Errors
/// Returns [`FollowupError`] if the checkpoint can't be read/written or the
/// event log can't be listed/read. Individual malformed event lines are
/// recorded as warnings and do not abort the run.
pub fn run(
    layout: &OpsLayout,
    now: &str,
    dry_run: bool,
    max_events: Option<usize>,
) -> Result<RunReport, FollowupError> {
    let consumer = consumer_name();
    let checkpoint = checkpoint::read(layout, &consumer, now).map_err(FollowupError::Checkpoint)?;

    let anchor_offset = checkpoint.last_read_offset.unwrap_or(0).max(0) as usize;
    let lines = log::read_forward_from_offset(layout, checkpoint.last_read_segment.as_ref(), anchor_offset)
        .map_err(FollowupError::Log)?;

    let lines: Vec<LogLine> = if let Some(limit) = max_events {
        lines.into_iter().take(limit).collect()
    } else {
        lines
    };

    let mut report = RunReport {
        ok: true,
        ..RunReport::default()
    };

    let mut last_position: Option<(SegmentKey, usize)> = None;

    for line in &lines {
        report.processed_lines += 1;
        let event = match KnowledgeEvent::from_line(&line.text) {
            Ok(event) => event,
            Err(e) => {
                report
                    .warnings
                    .push(format!("{}:{}: {e}", line.segment, line.line_index));
                last_position = Some((line.segment.clone(), line.line_index));
                continue;
            }
        };

        if event.event_type.is_merge() {
            report.merge_events_seen += 1;
            let obliged = event
                .obligations
                .as_ref()
                .is_some_and(|o| o.must_add_e2e);
            if obliged && !has_e2e_edit(event.touched_paths()) {
                match create_intake(layout, &event, dry_run) {
                    Ok(Some(created)) => report.created.push(created),
                    Ok(None) => report.skipped.push(event.event_id.clone()),
                    Err(e) => report.warnings.push(format!("{}: {e}", event.event_id)),
                }
            }
        }

        last_position = Some((line.segment.clone(), line.line_index));
    }

    if let Some((segment, offset)) = last_position {
        checkpoint::write_line_offset(layout, &consumer, Some(&segment), offset as i64, now, dry_run)
            .map_err(FollowupError::Checkpoint)?;
    }

    Ok(report)
}

fn derive_scope(event: &KnowledgeEvent) -> String {
    match &event.repo_id {
        Some(repo_id) => format!("repo:{repo_id}"),
        None => "system".to_owned(),
    }
}

fn intake_seed(event: &KnowledgeEvent, scope: &str) -> String {
    let obligations_json = event
        .obligations
        .as_ref()
        .and_then(|o| serde_json::to_string(o).ok())
        .unwrap_or_default();
    format!(
        "{}{}{}{}{}",
        event.event_id,
        event.work_id.as_deref().unwrap_or(""),
        scope,
        event.commit.as_deref().unwrap_or(""),
        obligations_json
    )
}

fn seed_hash(seed: &str) -> String {
    terseid::hash(seed.as_bytes(), 8)
}

pub(crate) fn fs_safe_timestamp(timestamp: &str) -> String {
    timestamp
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn create_intake(
    layout: &OpsLayout,
    event: &KnowledgeEvent,
    dry_run: bool,
) -> Result<Option<CreatedIntake>, std::io::Error> {
    let marker_path = layout.qa_followup_marker(&event.event_id);
    if marker_path.exists() {
        return Ok(None);
    }

    let scope = derive_scope(event);
    let seed = intake_seed(event, &scope);
    let hash = seed_hash(&seed);
    let ts = fs_safe_timestamp(&event.timestamp);
    let intake_id = format!("QA-{ts}_{hash}");
    let intake_path = layout.lane_b_inbox_dir().join(format!("{intake_id}.md"));

    if intake_path.exists() {
        return Ok(None);
    }

    if dry_run {
        return Ok(Some(CreatedIntake {
            event_id: event.event_id.clone(),
            intake_path: intake_path.display().to_string(),
        }));
    }

    let body = format!(
        "# QA follow-up: missing E2E coverage\n\n\
         - event_id: {}\n\
         - scope: {}\n\
         - work_id: {}\n\
         - commit: {}\n\
         - touched_paths: {:?}\n",
        event.event_id,
        scope,
        event.work_id.as_deref().unwrap_or(""),
        event.commit.as_deref().unwrap_or(""),
        event.touched_paths(),
    );
    write_atomic(&intake_path, body.as_bytes())?;

    let marker = serde_json::json!({ "event_id": event.event_id }).to_string();
    write_atomic(&marker_path, marker.as_bytes())?;
    let _ = fs::metadata(&marker_path);

    Ok(Some(CreatedIntake {
        event_id: event.event_id.clone(),
        intake_path: intake_path.display().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Artifacts, EventType, Obligations};
    use crate::ids::RepoId;
    use std::collections::BTreeMap;

    fn merge_event(id: &str, must_add_e2e: bool, changed_paths: Vec<&str>) -> KnowledgeEvent {
        KnowledgeEvent {
            event_id: id.to_owned(),
            timestamp: "2026-08-01T00:00:00Z".to_owned(),
            event_type: EventType::merge(),
            scope: "repo:repo-a".to_owned(),
            repo_id: Some(RepoId::new("repo-a").unwrap()),
            work_id: Some("WI-1".to_owned()),
            commit: Some("a".repeat(40)),
            summary: None,
            artifacts: Artifacts::default(),
            obligations: Some(Obligations {
                must_add_e2e,
                extra: BTreeMap::new(),
            }),
            changed_paths: Some(changed_paths.into_iter().map(str::to_owned).collect()),
            affected_paths: None,
            risk_level: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn classifies_paths_by_precedence() {
        assert_eq!(classify_path("cypress/e2e/login.cy.ts"), PathKind::E2e);
        assert_eq!(classify_path("tests/integration/foo.int.test.ts"), PathKind::Integration);
        assert_eq!(classify_path("src/__tests__/unit.test.ts"), PathKind::Unit);
        assert_eq!(classify_path("src/lib.rs"), PathKind::Other);
    }

    #[test]
    fn merge_missing_e2e_creates_intake_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        log::append(&layout, &key, &merge_event("evt-1", true, vec!["src/api.ts"])).unwrap();

        let report = run(&layout, "2026-08-01T01:00:00Z", false, None).unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.merge_events_seen, 1);
        assert!(layout.qa_followup_marker("evt-1").exists());
    }

    #[test]
    fn merge_with_e2e_edit_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        log::append(&layout, &key, &merge_event("evt-2", true, vec!["e2e/login.spec.ts"])).unwrap();

        let report = run(&layout, "2026-08-01T01:00:00Z", false, None).unwrap();
        assert_eq!(report.created.len(), 0);
    }

    #[test]
    fn processing_same_event_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        log::append(&layout, &key, &merge_event("evt-3", true, vec!["src/api.ts"])).unwrap();

        let first = run(&layout, "2026-08-01T01:00:00Z", false, None).unwrap();
        assert_eq!(first.created.len(), 1);

        // Reset the checkpoint to re-process the same line; the marker must
        // still prevent a duplicate intake.
        checkpoint::write_line_offset(&layout, &consumer_name(), None, 0, "2026-08-01T01:00:00Z", false).unwrap();
        let second = run(&layout, "2026-08-01T02:00:00Z", false, None).unwrap();
        assert_eq!(second.created.len(), 0);
    }

    #[test]
    fn malformed_line_warns_but_does_not_halt() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        let path = layout.event_segment(&key.segment_filename());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json\n").unwrap();

        let report = run(&layout, "2026-08-01T01:00:00Z", false, None).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.ok);
    }

    #[test]
    fn checkpoint_advances_to_last_processed_line() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        log::append(&layout, &key, &merge_event("evt-4", false, vec![])).unwrap();
        log::append(&layout, &key, &merge_event("evt-5", false, vec![])).unwrap();

        run(&layout, "2026-08-01T01:00:00Z", false, None).unwrap();
        let record = checkpoint::read(&layout, &consumer_name(), "now").unwrap();
        assert_eq!(record.last_read_offset, Some(1));
    }
}
