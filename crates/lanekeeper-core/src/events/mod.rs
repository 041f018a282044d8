//! Knowledge-change event model and the segmented append-only log that stores it.

pub mod types;

pub use types::{Artifacts, EventType, KnowledgeEvent, Obligations};
