//! Required collaborator contracts (§6.3): opaque callables the orchestrator
//! depends on but does not implement. Failures from these are surfaced but
//! never crash the orchestrator tick.

/// Result of a knowledge-scan run over one repo.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub ok: bool,
    pub failed: Vec<String>,
}

/// `Run({projectRoot, repoId, limit, concurrency, dryRun}) → {ok, failed[], …}`.
pub trait KnowledgeScan {
    fn run(&self, repo_id: &str, limit: u32, concurrency: u32, dry_run: bool) -> ScanOutcome;
}

/// A scan collaborator that always reports success without doing anything —
/// used where no real scan engine is wired in yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopKnowledgeScan;

impl KnowledgeScan for NoopKnowledgeScan {
    fn run(&self, _repo_id: &str, _limit: u32, _concurrency: u32, _dry_run: bool) -> ScanOutcome {
        ScanOutcome { ok: true, failed: vec![] }
    }
}

/// Mode for the knowledge update-meeting collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeetingMode {
    Status,
    Start,
    Close,
}

/// Result of a meeting collaborator call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeetingOutcome {
    pub ok: bool,
    pub meeting_id: Option<String>,
    pub sessions: Vec<String>,
}

/// `Run({projectRoot, mode, scope, dryRun}) → {ok, sessions[]|meeting_id, …}`.
pub trait KnowledgeUpdateMeeting {
    fn run(&self, mode: MeetingMode, scope: &str, dry_run: bool) -> MeetingOutcome;
}

/// A meetings collaborator that opens a deterministic, locally-tracked
/// meeting id without any external system — suitable until a real meetings
/// backend is wired in.
#[derive(Clone, Debug, Default)]
pub struct LocalUpdateMeeting;

impl KnowledgeUpdateMeeting for LocalUpdateMeeting {
    fn run(&self, mode: MeetingMode, scope: &str, _dry_run: bool) -> MeetingOutcome {
        match mode {
            MeetingMode::Start => MeetingOutcome {
                ok: true,
                meeting_id: Some(format!("UM-{scope}")),
                sessions: vec![],
            },
            MeetingMode::Status | MeetingMode::Close => MeetingOutcome {
                ok: true,
                meeting_id: None,
                sessions: vec![],
            },
        }
    }
}

/// Opaque committee-chair / writer / LLM-client callable. The orchestrator
/// treats any failure here as non-fatal: it logs and continues other work,
/// recomputing the stage on the next tick.
pub trait CommitteeChair {
    /// Evaluate a repo's evidence and return whether it passed, or `None` if
    /// the collaborator itself failed (distinct from an evidence failure).
    fn evaluate_repo(&self, repo_id: &str) -> Option<bool>;

    /// Evaluate the system-wide integration evidence.
    fn evaluate_integration(&self) -> Option<bool>;
}

/// A committee chair stub that always passes — used until a real committee
/// evaluation pipeline is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughCommitteeChair;

impl CommitteeChair for PassthroughCommitteeChair {
    fn evaluate_repo(&self, _repo_id: &str) -> Option<bool> {
        Some(true)
    }

    fn evaluate_integration(&self) -> Option<bool> {
        Some(true)
    }
}
