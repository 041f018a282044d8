//! Checkpoint store: one persisted read position per named consumer, under
//! `events/checkpoints/consumer-{name}.json`.
//!
//! Two checkpoint shapes are supported (§4.6):
//! - line-offset, `(last_read_segment, last_read_offset)` — used by the
//!   QA-merge follow-up consumer, resuming by 0-based line index.
//! - event-id, `(last_processed_segment, last_processed_event_id)` — used by
//!   the refresh-from-events consumer, resuming by locating an anchor event.

use std::fmt;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::ids::{ConsumerName, SegmentKey};
use crate::paths::OpsLayout;

/// On-disk checkpoint record. Both shapes live in one struct since a given
/// consumer only ever populates the fields relevant to the shape it uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Schema version, currently always 1.
    pub version: u32,
    /// The consumer this checkpoint belongs to.
    pub consumer: ConsumerName,
    /// Line-offset shape: last segment this consumer has read into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_segment: Option<SegmentKey>,
    /// Line-offset shape: 0-based line index within `last_read_segment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_offset: Option<i64>,
    /// Event-id shape: last segment a processed event was found in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_segment: Option<SegmentKey>,
    /// Event-id shape: id of the last successfully processed event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_event_id: Option<String>,
    /// ISO-8601 UTC timestamp of the last write.
    pub updated_at: String,
}

impl CheckpointRecord {
    /// A fresh, never-read checkpoint for `consumer`.
    #[must_use]
    pub fn defaulted(consumer: ConsumerName, now: &str) -> Self {
        Self {
            version: 1,
            consumer,
            last_read_segment: None,
            last_read_offset: None,
            last_processed_segment: None,
            last_processed_event_id: None,
            updated_at: now.to_owned(),
        }
    }
}

/// An error reading, validating, or writing a checkpoint.
#[derive(Debug)]
pub enum CheckpointError {
    /// The checkpoint file exists but could not be read.
    Read { path: String, source: std::io::Error },
    /// The checkpoint file's JSON was malformed.
    Parse { path: String, message: String },
    /// The checkpoint file could not be written.
    Write { path: String, source: std::io::Error },
    /// A write was attempted with an invalid line-offset shape.
    InvalidOffset { offset: i64 },
    /// A write specified a null segment with a non-zero offset.
    OffsetWithoutSegment { offset: i64 },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read checkpoint {path}: {source}"),
            Self::Parse { path, message } => write!(f, "failed to parse checkpoint {path}: {message}"),
            Self::Write { path, source } => write!(f, "failed to write checkpoint {path}: {source}"),
            Self::InvalidOffset { offset } => {
                write!(f, "last_read_offset must be >= 0, got {offset}")
            }
            Self::OffsetWithoutSegment { offset } => {
                write!(f, "last_read_segment is null but last_read_offset is {offset} (must be 0)")
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Read the checkpoint for `consumer`, defaulting if absent.
///
/// # Errors
/// Returns an error if the file exists but can't be read or parsed.
pub fn read(
    layout: &OpsLayout,
    consumer: &ConsumerName,
    now: &str,
) -> Result<CheckpointRecord, CheckpointError> {
    let path = layout.consumer_checkpoint(consumer);
    if !path.exists() {
        return Ok(CheckpointRecord::defaulted(consumer.clone(), now));
    }
    let text = fs::read_to_string(&path).map_err(|source| CheckpointError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| CheckpointError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write the line-offset shape checkpoint for `consumer`.
///
/// # Errors
/// Returns an error if the offset is negative, if a null segment is paired
/// with a non-zero offset, or if the write fails.
pub fn write_line_offset(
    layout: &OpsLayout,
    consumer: &ConsumerName,
    last_read_segment: Option<&SegmentKey>,
    last_read_offset: i64,
    now: &str,
    dry_run: bool,
) -> Result<CheckpointRecord, CheckpointError> {
    if last_read_offset < 0 {
        return Err(CheckpointError::InvalidOffset {
            offset: last_read_offset,
        });
    }
    if last_read_segment.is_none() && last_read_offset != 0 {
        return Err(CheckpointError::OffsetWithoutSegment {
            offset: last_read_offset,
        });
    }
    let record = CheckpointRecord {
        version: 1,
        consumer: consumer.clone(),
        last_read_segment: last_read_segment.cloned(),
        last_read_offset: Some(last_read_offset),
        last_processed_segment: None,
        last_processed_event_id: None,
        updated_at: now.to_owned(),
    };
    if !dry_run {
        persist(layout, consumer, &record)?;
    }
    Ok(record)
}

/// Write the event-id shape checkpoint for `consumer`.
///
/// # Errors
/// Returns an error if the write fails.
pub fn write_event_id(
    layout: &OpsLayout,
    consumer: &ConsumerName,
    last_processed_segment: &SegmentKey,
    last_processed_event_id: &str,
    now: &str,
    dry_run: bool,
) -> Result<CheckpointRecord, CheckpointError> {
    let record = CheckpointRecord {
        version: 1,
        consumer: consumer.clone(),
        last_read_segment: None,
        last_read_offset: None,
        last_processed_segment: Some(last_processed_segment.clone()),
        last_processed_event_id: Some(last_processed_event_id.to_owned()),
        updated_at: now.to_owned(),
    };
    if !dry_run {
        persist(layout, consumer, &record)?;
    }
    Ok(record)
}

fn persist(
    layout: &OpsLayout,
    consumer: &ConsumerName,
    record: &CheckpointRecord,
) -> Result<(), CheckpointError> {
    let path = layout.consumer_checkpoint(consumer);
    let json = serde_json::to_vec_pretty(record).unwrap_or_default();
    write_atomic(&path, &json).map_err(|source| CheckpointError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> ConsumerName {
        ConsumerName::new("qa-merge-followups").unwrap()
    }

    #[test]
    fn read_missing_checkpoint_is_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let record = read(&layout, &consumer(), "2026-08-01T00:00:00Z").unwrap();
        assert_eq!(record.last_read_segment, None);
        assert_eq!(record.last_read_offset, None);
    }

    #[test]
    fn write_then_read_line_offset_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        write_line_offset(&layout, &consumer(), Some(&key), 3, "2026-08-01T00:00:00Z", false)
            .unwrap();

        let record = read(&layout, &consumer(), "2026-08-01T01:00:00Z").unwrap();
        assert_eq!(record.last_read_segment, Some(key));
        assert_eq!(record.last_read_offset, Some(3));
    }

    #[test]
    fn write_then_read_event_id_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        write_event_id(&layout, &consumer(), &key, "evt-42", "2026-08-01T00:00:00Z", false)
            .unwrap();

        let record = read(&layout, &consumer(), "2026-08-01T01:00:00Z").unwrap();
        assert_eq!(record.last_processed_segment, Some(key));
        assert_eq!(record.last_processed_event_id, Some("evt-42".to_owned()));
    }

    #[test]
    fn negative_offset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        let result = write_line_offset(&layout, &consumer(), Some(&key), -1, "now", false);
        assert!(matches!(result, Err(CheckpointError::InvalidOffset { .. })));
    }

    #[test]
    fn nonzero_offset_without_segment_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let result = write_line_offset(&layout, &consumer(), None, 1, "now", false);
        assert!(matches!(result, Err(CheckpointError::OffsetWithoutSegment { .. })));
    }

    #[test]
    fn dry_run_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        write_line_offset(&layout, &consumer(), Some(&key), 5, "now", true).unwrap();
        assert!(!layout.consumer_checkpoint(&consumer()).exists());
    }
}
