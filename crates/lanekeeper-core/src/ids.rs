//! Validated identifier newtypes shared across Lane A components.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of value a [`ValidationError`] was raised for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A [`RepoId`] validation error.
    RepoId,
    /// A [`ConsumerName`] validation error.
    ConsumerName,
    /// A [`SegmentKey`] validation error.
    SegmentKey,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoId => write!(f, "RepoId"),
            Self::ConsumerName => write!(f, "ConsumerName"),
            Self::SegmentKey => write!(f, "SegmentKey"),
        }
    }
}

/// An error raised when constructing a validated identifier from an untrusted string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?} — {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// RepoId
// ---------------------------------------------------------------------------

/// A repository registry identifier: lower-kebab-case, e.g. `payments-api`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    /// Create a new `RepoId`, validating that it is lower-kebab-case.
    ///
    /// # Errors
    /// Returns an error if the string is empty or contains characters other
    /// than lowercase ascii letters, digits, and hyphens.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the repo id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                kind: ErrorKind::RepoId,
                value: s.to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        let ok = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !s.starts_with('-')
            && !s.ends_with('-');
        if !ok {
            return Err(ValidationError {
                kind: ErrorKind::RepoId,
                value: s.to_owned(),
                reason: "must be lower-kebab-case (a-z, 0-9, -, no leading/trailing hyphen)"
                    .to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// ConsumerName
// ---------------------------------------------------------------------------

/// A checkpoint-store consumer name, matching `^[a-z0-9][a-z0-9_-]{0,63}$`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsumerName(String);

impl ConsumerName {
    /// Create a new `ConsumerName`, validating its shape.
    ///
    /// # Errors
    /// Returns an error if the name is empty, longer than 64 characters, or
    /// doesn't match `^[a-z0-9][a-z0-9_-]{0,63}$`.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the consumer name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let err = |reason: &str| {
            Err(ValidationError {
                kind: ErrorKind::ConsumerName,
                value: s.to_owned(),
                reason: reason.to_owned(),
            })
        };
        if s.is_empty() || s.len() > 64 {
            return err("length must be between 1 and 64 characters");
        }
        let mut chars = s.chars();
        let first = chars.next().expect("non-empty checked above");
        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return err("first character must be a lowercase letter or digit");
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
            return err("must match ^[a-z0-9][a-z0-9_-]{0,63}$");
        }
        Ok(())
    }
}

impl fmt::Display for ConsumerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConsumerName {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConsumerName {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ConsumerName> for String {
    fn from(name: ConsumerName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// SegmentKey
// ---------------------------------------------------------------------------

/// An event-log segment key in `YYYYMMDD-HH` form, derived from a segment
/// file name (`events-YYYYMMDD-HH.jsonl`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentKey(String);

impl SegmentKey {
    /// Create a `SegmentKey` from its raw `YYYYMMDD-HH` form.
    ///
    /// # Errors
    /// Returns an error if the string isn't exactly 11 characters in the
    /// `YYYYMMDD-HH` shape (8 digits, hyphen, 2 digits).
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Derive a `SegmentKey` from a segment file name such as `events-20260101-00.jsonl`.
    ///
    /// # Errors
    /// Returns an error if the file name doesn't match the expected pattern.
    pub fn from_segment_filename(name: &str) -> Result<Self, ValidationError> {
        let key = name
            .strip_prefix("events-")
            .and_then(|s| s.strip_suffix(".jsonl"))
            .ok_or_else(|| ValidationError {
                kind: ErrorKind::SegmentKey,
                value: name.to_owned(),
                reason: "expected `events-YYYYMMDD-HH.jsonl`".to_owned(),
            })?;
        Self::new(key)
    }

    /// Render the segment file name this key corresponds to.
    #[must_use]
    pub fn segment_filename(&self) -> String {
        format!("events-{}.jsonl", self.0)
    }

    /// Return the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let err = |reason: &str| {
            Err(ValidationError {
                kind: ErrorKind::SegmentKey,
                value: s.to_owned(),
                reason: reason.to_owned(),
            })
        };
        let bytes = s.as_bytes();
        if bytes.len() != 11 {
            return err("expected 11 characters: YYYYMMDD-HH");
        }
        let digits_ok = |range: std::ops::Range<usize>| {
            s[range].bytes().all(|b| b.is_ascii_digit())
        };
        if !digits_ok(0..8) || bytes[8] != b'-' || !digits_ok(9..11) {
            return err("expected shape YYYYMMDD-HH");
        }
        Ok(())
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SegmentKey {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SegmentKey {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<SegmentKey> for String {
    fn from(key: SegmentKey) -> Self {
        key.0
    }
}
