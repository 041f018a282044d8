//! Lane A state: the stage/evidence/next-action triple persisted every tick (§3.1, §4.1).

use serde::{Deserialize, Serialize};

/// The orchestrator's current stage, in priority order (§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    DecisionNeeded,
    NeedsIndex,
    NeedsScan,
    NeedsKickoff,
    RefreshNeeded,
    CommitteePending,
    CommitteeRepoFailed,
    CommitteeRepoPassed,
    CommitteeIntegrationFailed,
    CommitteePassed,
    ReadyForWriter,
    /// One-shot resume state surfaced after a `DecisionNeeded` stage clears.
    DecisionAnswered,
}

/// Coarse evidence maturity across the active registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    /// At least one active repo lacks an index.
    None,
    /// All active repos have indexes but some lack scans.
    Partial,
    /// All active repos have indexes and scans.
    Complete,
}

/// Per-tick knowledge-maturity summary (§3.1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceState {
    pub evidence_level: EvidenceLevel,
    pub scan_coverage_complete: bool,
    pub minimum_sufficient: bool,
    pub pending_events: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_index_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synth_at: Option<String>,
    pub milestone_status: String,
}

impl EvidenceState {
    /// Derive `evidence_level` from per-repo index/scan presence, per the
    /// invariant in §3.3: `none` iff any active repo lacks an index,
    /// `partial` iff all have indexes but some lack scans, else `complete`.
    #[must_use]
    pub fn level_from_coverage(any_missing_index: bool, any_missing_scan: bool) -> EvidenceLevel {
        if any_missing_index {
            EvidenceLevel::None
        } else if any_missing_scan {
            EvidenceLevel::Partial
        } else {
            EvidenceLevel::Complete
        }
    }
}

/// The single next action the orchestrator has decided to take.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub target_repos: Vec<String>,
    pub reason: String,
}

/// Kinds of action the orchestrator can schedule or execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Question,
    Index,
    Scan,
    Refresh,
    /// Scheduled-only action with no executable side effect this tick.
    Wait,
}

/// The full persisted Lane A state document (`state.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneAState {
    pub version: u32,
    pub stage: Stage,
    pub evidence_state: EvidenceState,
    pub next_action: NextAction,
}

impl LaneAState {
    /// Validate the `next_action.target_repos ⊆ active_registry` invariant
    /// (§3.3), and that the batch size respects `limit` when set.
    #[must_use]
    pub fn validate_target_repos(&self, active_repo_ids: &[String], limit: Option<usize>) -> bool {
        let subset = self
            .next_action
            .target_repos
            .iter()
            .all(|r| active_repo_ids.contains(r));
        let within_limit = limit.is_none_or(|l| self.next_action.target_repos.len() <= l);
        subset && within_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_level_none_when_any_index_missing() {
        assert_eq!(
            EvidenceState::level_from_coverage(true, true),
            EvidenceLevel::None
        );
        assert_eq!(
            EvidenceState::level_from_coverage(true, false),
            EvidenceLevel::None
        );
    }

    #[test]
    fn evidence_level_partial_when_scans_missing() {
        assert_eq!(
            EvidenceState::level_from_coverage(false, true),
            EvidenceLevel::Partial
        );
    }

    #[test]
    fn evidence_level_complete_when_fully_covered() {
        assert_eq!(
            EvidenceState::level_from_coverage(false, false),
            EvidenceLevel::Complete
        );
    }

    fn sample_state(target_repos: Vec<String>) -> LaneAState {
        LaneAState {
            version: 1,
            stage: Stage::NeedsIndex,
            evidence_state: EvidenceState {
                evidence_level: EvidenceLevel::None,
                scan_coverage_complete: false,
                minimum_sufficient: false,
                pending_events: 0,
                last_index_at: None,
                last_scan_at: None,
                last_synth_at: None,
                milestone_status: "none".to_owned(),
            },
            next_action: NextAction {
                action_type: ActionType::Index,
                target_repos,
                reason: "missing index".to_owned(),
            },
        }
    }

    #[test]
    fn target_repos_must_be_subset_of_active_registry() {
        let state = sample_state(vec!["repo-a".to_owned()]);
        assert!(state.validate_target_repos(&["repo-a".to_owned(), "repo-b".to_owned()], None));
        assert!(!state.validate_target_repos(&["repo-b".to_owned()], None));
    }

    #[test]
    fn target_repos_respects_limit() {
        let state = sample_state(vec!["repo-a".to_owned(), "repo-b".to_owned()]);
        let active = vec!["repo-a".to_owned(), "repo-b".to_owned()];
        assert!(state.validate_target_repos(&active, Some(2)));
        assert!(!state.validate_target_repos(&active, Some(1)));
    }
}
