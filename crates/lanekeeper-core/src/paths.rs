//! Filesystem layout under `OPS_ROOT`, mirroring the directory tree laid out
//! in the external interfaces contract.
//!
//! ```text
//! ai/lane_a/
//!   checkpoints/ {state.json, STATE.md, next_action_hint.json, state.error.json}
//!   events/segments/events-YYYYMMDD-HH.jsonl
//!   events/checkpoints/consumer-{name}.json
//!   events/summary.json
//!   events/qa_followups/{event_id}.json
//!   staleness/ {soft_stale_tracker.json, soft_stale_escalations_{YYYYMMDD}.json}
//!   decision_packets/DP-SOFT-STALE-{YYYYMMDD}_{hex8}.md
//!   meetings/UM-{YYYYMMDD_HHMMSS}__{scope-slug}/MEETING.json
//!   refresh_hints/RH-{ts}__{scope-slug}.json
//!   locks/lane-a-orchestrate.lock.json
//!   locks/status/LOCK_STATUS-{ts}.json
//!   logs/
//!   repos/{repo_id}/ {repo_index.json, repo_fingerprints.json, scan_status.json}
//! ai/lane_b/inbox/{intake_id}.md
//! ```

use std::path::{Path, PathBuf};

use crate::ids::{ConsumerName, RepoId};

/// Resolves all Lane A / Lane B paths relative to a single `OPS_ROOT`.
#[derive(Clone, Debug)]
pub struct OpsLayout {
    root: PathBuf,
}

impl OpsLayout {
    /// Build a layout rooted at `ops_root`.
    #[must_use]
    pub fn new(ops_root: impl Into<PathBuf>) -> Self {
        Self { root: ops_root.into() }
    }

    /// The `OPS_ROOT` this layout is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lane_a(&self) -> PathBuf {
        self.root.join("ai/lane_a")
    }

    #[must_use]
    pub fn state_json(&self) -> PathBuf {
        self.lane_a().join("checkpoints/state.json")
    }

    #[must_use]
    pub fn state_md(&self) -> PathBuf {
        self.lane_a().join("checkpoints/STATE.md")
    }

    #[must_use]
    pub fn next_action_hint_json(&self) -> PathBuf {
        self.lane_a().join("checkpoints/next_action_hint.json")
    }

    #[must_use]
    pub fn state_error_json(&self) -> PathBuf {
        self.lane_a().join("checkpoints/state.error.json")
    }

    #[must_use]
    pub fn event_segments_dir(&self) -> PathBuf {
        self.lane_a().join("events/segments")
    }

    #[must_use]
    pub fn event_segment(&self, segment_filename: &str) -> PathBuf {
        self.event_segments_dir().join(segment_filename)
    }

    #[must_use]
    pub fn consumer_checkpoints_dir(&self) -> PathBuf {
        self.lane_a().join("events/checkpoints")
    }

    #[must_use]
    pub fn consumer_checkpoint(&self, consumer: &ConsumerName) -> PathBuf {
        self.consumer_checkpoints_dir()
            .join(format!("consumer-{consumer}.json"))
    }

    #[must_use]
    pub fn qa_followups_dir(&self) -> PathBuf {
        self.lane_a().join("events/qa_followups")
    }

    #[must_use]
    pub fn qa_followup_marker(&self, event_id: &str) -> PathBuf {
        self.qa_followups_dir().join(format!("{event_id}.json"))
    }

    #[must_use]
    pub fn staleness_dir(&self) -> PathBuf {
        self.lane_a().join("staleness")
    }

    #[must_use]
    pub fn soft_stale_tracker_json(&self) -> PathBuf {
        self.staleness_dir().join("soft_stale_tracker.json")
    }

    #[must_use]
    pub fn soft_stale_escalations_json(&self, yyyymmdd: &str) -> PathBuf {
        self.staleness_dir()
            .join(format!("soft_stale_escalations_{yyyymmdd}.json"))
    }

    #[must_use]
    pub fn decision_packets_dir(&self) -> PathBuf {
        self.lane_a().join("decision_packets")
    }

    #[must_use]
    pub fn meetings_dir(&self) -> PathBuf {
        self.lane_a().join("meetings")
    }

    #[must_use]
    pub fn refresh_hints_dir(&self) -> PathBuf {
        self.lane_a().join("refresh_hints")
    }

    #[must_use]
    pub fn events_summary_json(&self) -> PathBuf {
        self.lane_a().join("events/summary.json")
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.lane_a().join("locks/lane-a-orchestrate.lock.json")
    }

    #[must_use]
    pub fn lock_status_dir(&self) -> PathBuf {
        self.lane_a().join("locks/status")
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.lane_a().join("logs")
    }

    #[must_use]
    pub fn lane_b_inbox_dir(&self) -> PathBuf {
        self.root.join("ai/lane_b/inbox")
    }

    /// Per-repo index/fingerprint output directory: `ai/lane_a/repos/{repo_id}/`.
    #[must_use]
    pub fn repo_output_dir(&self, repo_id: &RepoId) -> PathBuf {
        self.lane_a().join("repos").join(repo_id.as_str())
    }

    #[must_use]
    pub fn repo_index_json(&self, repo_id: &RepoId) -> PathBuf {
        self.repo_output_dir(repo_id).join("repo_index.json")
    }

    #[must_use]
    pub fn repo_fingerprints_json(&self, repo_id: &RepoId) -> PathBuf {
        self.repo_output_dir(repo_id).join("repo_fingerprints.json")
    }

    /// Scan-completion marker, written after a successful knowledge scan and
    /// invalidated whenever the repo is re-indexed.
    #[must_use]
    pub fn repo_scan_status_json(&self, repo_id: &RepoId) -> PathBuf {
        self.repo_output_dir(repo_id).join("scan_status.json")
    }

    #[must_use]
    pub fn repo_error_json(&self, repo_id: &RepoId) -> PathBuf {
        self.logs_dir().join(format!("{repo_id}.index-error.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_under_ops_root() {
        let layout = OpsLayout::new("/ops");
        assert_eq!(layout.state_json(), Path::new("/ops/ai/lane_a/checkpoints/state.json"));
        assert_eq!(layout.lock_file(), Path::new("/ops/ai/lane_a/locks/lane-a-orchestrate.lock.json"));
        assert_eq!(layout.lane_b_inbox_dir(), Path::new("/ops/ai/lane_b/inbox"));
        assert_eq!(layout.events_summary_json(), Path::new("/ops/ai/lane_a/events/summary.json"));
    }

    #[test]
    fn consumer_checkpoint_is_named_by_consumer() {
        let layout = OpsLayout::new("/ops");
        let consumer = ConsumerName::new("qa-merge-followups").unwrap();
        assert_eq!(
            layout.consumer_checkpoint(&consumer),
            Path::new("/ops/ai/lane_a/events/checkpoints/consumer-qa-merge-followups.json")
        );
    }
}
