//! Knowledge-change event model — canonical JSON for the segmented event log.
//!
//! Events are immutable once written. Unknown fields on read are preserved in
//! `extra` rather than rejected, since the event stream is a cross-process
//! contract and producers may add fields the current consumer doesn't know
//! about yet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::RepoId;

/// The kind of knowledge-change event. Stored as its raw string so that event
/// types beyond `merge`/`scan`/`index` round-trip without loss — the stream
/// is a cross-process contract and producers may introduce new types before
/// every consumer knows about them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// A work item was merged.
    #[must_use]
    pub fn merge() -> Self {
        Self("merge".to_owned())
    }

    /// A repo was scanned by the knowledge-scan collaborator.
    #[must_use]
    pub fn scan() -> Self {
        Self("scan".to_owned())
    }

    /// A repo index was (re)computed.
    #[must_use]
    pub fn index() -> Self {
        Self("index".to_owned())
    }

    /// Wrap an arbitrary event-type string.
    #[must_use]
    pub fn other(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the event type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `merge` event type.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.0 == "merge"
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Obligations attached to a merge event (e.g. "this change requires an E2E test").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Obligations {
    /// Whether the change is obliged to add end-to-end test coverage.
    pub must_add_e2e: bool,
    /// Any other obligation keys the producer attached, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Artifact paths attached to an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifacts {
    /// Paths of artifacts produced alongside the event.
    pub paths: Vec<String>,
}

/// A single immutable knowledge-change event.
///
/// Field order matches declaration order in `serde_json` output; combined
/// with a `BTreeMap` for `extra`, two calls to [`KnowledgeEvent::to_canonical_json`]
/// on the same value always produce identical bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEvent {
    /// Unique event identifier, assigned by the producer.
    pub event_id: String,
    /// ISO-8601 UTC timestamp of when the event was produced.
    pub timestamp: String,
    /// The kind of event.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The event's scope, e.g. `"repo:payments-api"` or `"system"`.
    pub scope: String,
    /// The repo this event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<RepoId>,
    /// The work item this event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_id: Option<String>,
    /// The commit SHA this event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// A short human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Artifacts produced alongside the event.
    #[serde(default, skip_serializing_if = "is_default_artifacts")]
    pub artifacts: Artifacts,
    /// Obligations attached to a merge event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligations: Option<Obligations>,
    /// Paths changed by the underlying work item, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_paths: Option<Vec<String>>,
    /// Paths affected by the underlying work item, if known (alternate to `changed_paths`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_paths: Option<Vec<String>>,
    /// A risk classification for the event, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    /// Any other fields the producer attached, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn is_default_artifacts(a: &Artifacts) -> bool {
    a.paths.is_empty()
}

impl KnowledgeEvent {
    /// The union of `changed_paths` and `affected_paths`, whichever is present.
    #[must_use]
    pub fn touched_paths(&self) -> &[String] {
        self.changed_paths
            .as_deref()
            .or(self.affected_paths.as_deref())
            .unwrap_or(&[])
    }

    /// Serialize this event to canonical JSON bytes (sorted keys, deterministic).
    ///
    /// # Errors
    /// Returns an error if serialization fails (shouldn't happen for a valid event).
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a single JSONL line into an event.
    ///
    /// # Errors
    /// Returns an error if the line is not valid JSON or doesn't match the
    /// event schema.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event_id: &str) -> KnowledgeEvent {
        KnowledgeEvent {
            event_id: event_id.to_owned(),
            timestamp: "2026-08-01T00:00:00Z".to_owned(),
            event_type: EventType::merge(),
            scope: "repo:payments-api".to_owned(),
            repo_id: Some(RepoId::new("payments-api").unwrap()),
            work_id: Some("WI-1".to_owned()),
            commit: Some("a".repeat(40)),
            summary: Some("merged feature branch".to_owned()),
            artifacts: Artifacts::default(),
            obligations: Some(Obligations {
                must_add_e2e: true,
                extra: BTreeMap::new(),
            }),
            changed_paths: Some(vec!["src/lib.rs".to_owned()]),
            affected_paths: None,
            risk_level: Some("low".to_owned()),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn round_trips_through_canonical_json() {
        let event = sample("evt-1");
        let json = event.to_canonical_json().unwrap();
        let line = String::from_utf8(json).unwrap();
        let parsed = KnowledgeEvent::from_line(&line).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn touched_paths_prefers_changed_over_affected() {
        let mut event = sample("evt-2");
        event.changed_paths = Some(vec!["a.rs".to_owned()]);
        event.affected_paths = Some(vec!["b.rs".to_owned()]);
        assert_eq!(event.touched_paths(), &["a.rs".to_owned()]);
    }

    #[test]
    fn touched_paths_falls_back_to_affected() {
        let mut event = sample("evt-3");
        event.changed_paths = None;
        event.affected_paths = Some(vec!["b.rs".to_owned()]);
        assert_eq!(event.touched_paths(), &["b.rs".to_owned()]);
    }

    #[test]
    fn unknown_fields_are_preserved_via_extra() {
        let line = r#"{"event_id":"evt-4","timestamp":"2026-08-01T00:00:00Z","type":"merge","scope":"system","future_field":"xyz"}"#;
        let event = KnowledgeEvent::from_line(line).unwrap();
        assert_eq!(
            event.extra.get("future_field"),
            Some(&serde_json::Value::String("xyz".to_owned()))
        );
        let reserialized = String::from_utf8(event.to_canonical_json().unwrap()).unwrap();
        assert!(reserialized.contains("future_field"));
    }

    #[test]
    fn blank_and_malformed_lines_fail_parse() {
        assert!(KnowledgeEvent::from_line("").is_err());
        assert!(KnowledgeEvent::from_line("not json").is_err());
    }

    #[test]
    fn canonical_json_is_deterministic() {
        let event = sample("evt-5");
        let a = event.to_canonical_json().unwrap();
        let b = event.to_canonical_json().unwrap();
        assert_eq!(a, b);
    }
}
