//! Segmented, line-delimited append-only event log under `events/segments/`.
//!
//! Segment file names follow `events-YYYYMMDD-HH.jsonl` and are discovered by
//! lexicographic sort, which coincides with chronological order for this
//! naming scheme (hourly rotation). Appends are line-atomic: each call opens
//! the segment in append mode and writes one line, so a concurrent reader
//! never observes a half-written line as long as the write is smaller than
//! the filesystem's atomic write size — matching the "active segment may be
//! concurrently appended to while consumers read earlier segments" contract.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write as IoWrite};

use crate::events::KnowledgeEvent;
use crate::ids::SegmentKey;
use crate::paths::OpsLayout;

/// An error encountered while appending to or reading the event log.
#[derive(Debug)]
pub enum EventLogError {
    /// The segments directory could not be listed.
    ListSegments { path: String, source: io::Error },
    /// A segment file could not be opened for append or read.
    OpenSegment { path: String, source: io::Error },
    /// Writing a line to a segment failed.
    WriteLine { path: String, source: io::Error },
    /// A segment filename did not match the expected `events-YYYYMMDD-HH.jsonl` shape.
    MalformedSegmentName { name: String },
}

impl std::fmt::Display for EventLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListSegments { path, source } => {
                write!(f, "failed to list segments under {path}: {source}")
            }
            Self::OpenSegment { path, source } => {
                write!(f, "failed to open segment {path}: {source}")
            }
            Self::WriteLine { path, source } => {
                write!(f, "failed to append event to {path}: {source}")
            }
            Self::MalformedSegmentName { name } => {
                write!(f, "segment file name {name:?} does not match events-YYYYMMDD-HH.jsonl")
            }
        }
    }
}

impl std::error::Error for EventLogError {}

/// One non-blank line read from a segment, with its position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Which segment this line came from.
    pub segment: SegmentKey,
    /// 0-based line index within the segment (blank lines still count toward
    /// the index so offsets remain stable across re-reads).
    pub line_index: usize,
    /// The raw line text (not yet parsed into an event).
    pub text: String,
}

/// Append a knowledge event to the segment named for `segment_key`.
///
/// # Errors
/// Returns an error if the segment file can't be opened or written to.
pub fn append(
    layout: &OpsLayout,
    segment_key: &SegmentKey,
    event: &KnowledgeEvent,
) -> Result<(), EventLogError> {
    let dir = layout.event_segments_dir();
    fs::create_dir_all(&dir).map_err(|source| EventLogError::OpenSegment {
        path: dir.display().to_string(),
        source,
    })?;
    let path = layout.event_segment(&segment_key.segment_filename());
    let json = event
        .to_canonical_json()
        .unwrap_or_else(|_| b"{}".to_vec());

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| EventLogError::OpenSegment {
            path: path.display().to_string(),
            source,
        })?;

    let mut line = json;
    line.push(b'\n');
    file.write_all(&line)
        .map_err(|source| EventLogError::WriteLine {
            path: path.display().to_string(),
            source,
        })
}

/// List all discovered segment keys in lexicographic (= chronological) order.
///
/// # Errors
/// Returns an error if the segments directory exists but can't be listed.
/// A missing directory yields an empty list, not an error.
pub fn list_segments(layout: &OpsLayout) -> Result<Vec<SegmentKey>, EventLogError> {
    let dir = layout.event_segments_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(&dir).map_err(|source| EventLogError::ListSegments {
        path: dir.display().to_string(),
        source,
    })?;

    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| EventLogError::ListSegments {
            path: dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(".jsonl") {
            continue;
        }
        match SegmentKey::from_segment_filename(name) {
            Ok(key) => keys.push(key),
            Err(_) => continue,
        }
    }
    keys.sort();
    Ok(keys)
}

/// Read every non-blank line from a segment, in order, starting at `line_index`.
///
/// # Errors
/// Returns an error if the segment file can't be opened.
pub fn read_segment_lines(
    layout: &OpsLayout,
    segment: &SegmentKey,
) -> Result<Vec<LogLine>, EventLogError> {
    let path = layout.event_segment(&segment.segment_filename());
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&path).map_err(|source| EventLogError::OpenSegment {
        path: path.display().to_string(),
        source,
    })?;
    let reader = io::BufReader::new(file);

    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let text = line.map_err(|source| EventLogError::OpenSegment {
            path: path.display().to_string(),
            source,
        })?;
        if text.trim().is_empty() {
            continue;
        }
        lines.push(LogLine {
            segment: segment.clone(),
            line_index: index,
            text,
        });
    }
    Ok(lines)
}

/// Read forward from (and strictly after) `(anchor_segment, anchor_offset)`,
/// across all discovered segments, in the line-offset consumer's resume model.
///
/// `anchor_segment == None` means "read everything from the start".
///
/// # Errors
/// Returns an error if segment discovery or reading fails.
pub fn read_forward_from_offset(
    layout: &OpsLayout,
    anchor_segment: Option<&SegmentKey>,
    anchor_offset: usize,
) -> Result<Vec<LogLine>, EventLogError> {
    let segments = list_segments(layout)?;
    let mut out = Vec::new();
    for segment in &segments {
        if let Some(anchor) = anchor_segment {
            if segment < anchor {
                continue;
            }
        }
        let lines = read_segment_lines(layout, segment)?;
        for line in lines {
            let is_anchor_segment = anchor_segment == Some(segment);
            if is_anchor_segment && line.line_index <= anchor_offset {
                continue;
            }
            out.push(line);
        }
    }
    Ok(out)
}

/// Read forward from (and strictly after) an anchor event, located by id
/// within `anchor_segment`, in the event-id consumer's resume model.
///
/// Returns an error if the anchor segment or the anchor event within it
/// cannot be found — per the refresh-from-events consumer's corruption
/// signal contract.
///
/// # Errors
/// Returns [`EventLogError`] if segment listing/reading fails, or if the
/// anchor segment or anchor event id is not found.
pub fn read_forward_from_event_id(
    layout: &OpsLayout,
    anchor_segment: &SegmentKey,
    anchor_event_id: &str,
) -> Result<Vec<LogLine>, AnchorError> {
    let segments = list_segments(layout).map_err(AnchorError::Log)?;
    if !segments.contains(anchor_segment) {
        return Err(AnchorError::SegmentNotFound {
            segment: anchor_segment.clone(),
        });
    }

    let mut found_anchor = false;
    let mut out = Vec::new();
    for segment in &segments {
        if segment < anchor_segment {
            continue;
        }
        let lines = read_segment_lines(layout, segment).map_err(AnchorError::Log)?;
        if segment == anchor_segment {
            let anchor_pos = lines.iter().position(|l| {
                KnowledgeEvent::from_line(&l.text)
                    .map(|e| e.event_id == anchor_event_id)
                    .unwrap_or(false)
            });
            match anchor_pos {
                Some(pos) => {
                    found_anchor = true;
                    out.extend(lines.into_iter().skip(pos + 1));
                }
                None => {
                    return Err(AnchorError::EventNotFound {
                        event_id: anchor_event_id.to_owned(),
                    });
                }
            }
        } else {
            out.extend(lines);
        }
    }

    if !found_anchor {
        return Err(AnchorError::EventNotFound {
            event_id: anchor_event_id.to_owned(),
        });
    }
    Ok(out)
}

/// Error locating an event-id anchor in the log.
#[derive(Debug)]
pub enum AnchorError {
    /// The underlying log read failed.
    Log(EventLogError),
    /// The anchor segment does not exist among discovered segments.
    SegmentNotFound { segment: SegmentKey },
    /// The anchor segment exists but the anchor event id is not in it.
    EventNotFound { event_id: String },
}

impl std::fmt::Display for AnchorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log(e) => write!(f, "{e}"),
            Self::SegmentNotFound { segment } => {
                write!(f, "anchor segment {segment} not found among event segments — possible checkpoint corruption")
            }
            Self::EventNotFound { event_id } => {
                write!(f, "anchor event {event_id:?} not found in its recorded segment — possible checkpoint corruption")
            }
        }
    }
}

impl std::error::Error for AnchorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use std::collections::BTreeMap;

    fn event(id: &str) -> KnowledgeEvent {
        KnowledgeEvent {
            event_id: id.to_owned(),
            timestamp: "2026-08-01T00:00:00Z".to_owned(),
            event_type: EventType::merge(),
            scope: "system".to_owned(),
            repo_id: None,
            work_id: None,
            commit: None,
            summary: None,
            artifacts: crate::events::Artifacts::default(),
            obligations: None,
            changed_paths: None,
            affected_paths: None,
            risk_level: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn append_and_list_segments() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        append(&layout, &key, &event("e1")).unwrap();
        append(&layout, &key, &event("e2")).unwrap();

        let segments = list_segments(&layout).unwrap();
        assert_eq!(segments, vec![key.clone()]);

        let lines = read_segment_lines(&layout, &key).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_index, 0);
        assert_eq!(lines[1].line_index, 1);
    }

    #[test]
    fn segments_sort_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let late = SegmentKey::new("20260801-05").unwrap();
        let early = SegmentKey::new("20260801-01").unwrap();
        append(&layout, &late, &event("e1")).unwrap();
        append(&layout, &early, &event("e2")).unwrap();

        let segments = list_segments(&layout).unwrap();
        assert_eq!(segments, vec![early, late]);
    }

    #[test]
    fn read_forward_from_offset_skips_anchor_and_below() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        append(&layout, &key, &event("e1")).unwrap();
        append(&layout, &key, &event("e2")).unwrap();
        append(&layout, &key, &event("e3")).unwrap();

        let lines = read_forward_from_offset(&layout, Some(&key), 0).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_index, 1);
        assert_eq!(lines[1].line_index, 2);
    }

    #[test]
    fn read_forward_from_offset_none_anchor_reads_everything() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        append(&layout, &key, &event("e1")).unwrap();

        let lines = read_forward_from_offset(&layout, None, 0).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn read_forward_from_event_id_finds_anchor_and_reads_strictly_after() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        append(&layout, &key, &event("e1")).unwrap();
        append(&layout, &key, &event("e2")).unwrap();
        append(&layout, &key, &event("e3")).unwrap();

        let lines = read_forward_from_event_id(&layout, &key, "e1").unwrap();
        assert_eq!(lines.len(), 2);
        let ids: Vec<_> = lines
            .iter()
            .map(|l| KnowledgeEvent::from_line(&l.text).unwrap().event_id)
            .collect();
        assert_eq!(ids, vec!["e2".to_owned(), "e3".to_owned()]);
    }

    #[test]
    fn read_forward_from_event_id_missing_segment_errors() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        let missing = SegmentKey::new("20260802-00").unwrap();

        let result = read_forward_from_event_id(&layout, &missing, "e1");
        assert!(matches!(result, Err(AnchorError::SegmentNotFound { .. })));
        let _ = key;
    }

    #[test]
    fn read_forward_from_event_id_missing_event_errors() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        append(&layout, &key, &event("e1")).unwrap();

        let result = read_forward_from_event_id(&layout, &key, "does-not-exist");
        assert!(matches!(result, Err(AnchorError::EventNotFound { .. })));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OpsLayout::new(dir.path());
        let key = SegmentKey::new("20260801-00").unwrap();
        let path = layout.event_segment(&key.segment_filename());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "\n{\"event_id\":\"e1\",\"timestamp\":\"2026-08-01T00:00:00Z\",\"type\":\"merge\",\"scope\":\"system\"}\n\n").unwrap();

        let lines = read_segment_lines(&layout, &key).unwrap();
        assert_eq!(lines.len(), 1);
    }
}
