//! Domain logic for the dual-lane orchestrator: Lane A knowledge-state
//! tracking (indexing, staleness, committees, sufficiency) communicating
//! with Lane B work items through a durable event log and shared filesystem.

pub mod atomic;
pub mod checkpoint;
pub mod collaborators;
pub mod config;
pub mod events;
pub mod ids;
pub mod indexer;
pub mod lock;
pub mod log;
pub mod orchestrator;
pub mod paths;
pub mod qa_followup;
pub mod refresh;
pub mod registry;
pub mod staleness;
pub mod state;

pub use ids::{ConsumerName, RepoId, SegmentKey, ValidationError};
pub use paths::OpsLayout;
