//! Lane A lock manager: an exclusive-create lock file serializing orchestrator
//! ticks within a single host (§4.8).

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};

const MAX_ACQUIRE_ATTEMPTS: u32 = 4;

/// On-disk lock record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Schema version, currently always 1.
    pub version: u32,
    /// Human-readable name of the lock (`"lane-a-orchestrate"`).
    pub lock_name: String,
    /// ISO-8601 UTC creation time.
    pub created_at: String,
    /// ISO-8601 UTC expiry time (`created_at + ttl`).
    pub expires_at: String,
    /// PID of the process that acquired the lock.
    pub pid: u32,
    /// Numeric uid of the acquiring user (0 on platforms without one).
    pub uid: u32,
    /// Username of the acquiring user.
    pub user: String,
    /// Hostname of the acquiring host.
    pub host: String,
    /// Current working directory at acquisition time.
    pub cwd: String,
    /// The command line that acquired the lock.
    pub command: String,
    /// The project root this lock guards.
    pub project_root: String,
    /// The `AI_PROJECT_ROOT` in effect at acquisition time.
    pub ai_project_root: String,
    /// 32+ hex-char random token identifying this specific acquisition.
    pub owner_token: String,
}

/// Outcome of an acquire attempt.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// The lock was acquired fresh.
    Acquired(LockRecord),
    /// A stale lock was found and broken, then the lock was acquired.
    BrokeStale(LockRecord),
    /// The lock is currently held by a live owner.
    Held { record: LockRecord },
}

impl AcquireOutcome {
    /// Whether this outcome represents a successful acquisition.
    #[must_use]
    pub fn acquired(&self) -> bool {
        !matches!(self, Self::Held { .. })
    }
}

/// Outcome of a release attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lock was released.
    Released,
    /// No lock file was present.
    Missing,
    /// The lock file exists but is owned by a different token.
    NotOwner,
}

/// An error acquiring or releasing the lock.
#[derive(Debug)]
pub enum LockError {
    /// An I/O error occurred that isn't expected lock contention.
    Io { path: String, source: io::Error },
    /// All acquire attempts were exhausted without success.
    AttemptsExhausted,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "lock I/O error on {path}: {source}"),
            Self::AttemptsExhausted => {
                write!(f, "failed to acquire lock after {MAX_ACQUIRE_ATTEMPTS} attempts")
            }
        }
    }
}

impl std::error::Error for LockError {}

/// A checked-out lock, released on drop or via [`LockGuard::release`].
///
/// Grounded on the scoped-acquisition-guard pattern: a tick always releases
/// the lock on every exit path, including panics unwinding through `drop`.
pub struct LockGuard {
    path: PathBuf,
    record: LockRecord,
    released: bool,
}

impl LockGuard {
    /// The lock record this guard holds.
    #[must_use]
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Release the lock explicitly, returning the outcome.
    ///
    /// # Errors
    /// Returns an error only for unexpected I/O failures (not "not_owner" or
    /// "missing", which are represented as [`ReleaseOutcome`] variants).
    pub fn release(mut self) -> Result<ReleaseOutcome, LockError> {
        let outcome = release_impl(&self.path, &self.record.owner_token)?;
        self.released = true;
        Ok(outcome)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = release_impl(&self.path, &self.record.owner_token);
        }
    }
}

/// Acquire the Lane A lock at `path`, with the given `ttl_ms` and metadata.
///
/// # Errors
/// Returns an error on unexpected I/O failure, or [`LockError::AttemptsExhausted`]
/// if all [`MAX_ACQUIRE_ATTEMPTS`] attempts found a live lock.
pub fn acquire(
    path: &Path,
    ttl_ms: i64,
    now_unix_ms: i64,
    now_iso: &str,
    expires_iso: &str,
    metadata: LockMetadata,
) -> Result<AcquireOutcome, LockError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LockError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let mut broke_stale = false;
    for _attempt in 0..MAX_ACQUIRE_ATTEMPTS {
        let record = build_record(&metadata, now_iso, expires_iso);
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let json = serde_json::to_vec_pretty(&record).unwrap_or_default();
                file.write_all(&json).map_err(|source| LockError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                return Ok(if broke_stale {
                    AcquireOutcome::BrokeStale(record)
                } else {
                    AcquireOutcome::Acquired(record)
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let existing = read_record(path);
                let is_stale = match &existing {
                    Some(r) => parse_epoch_ms(&r.expires_at)
                        .map(|exp| now_unix_ms >= exp)
                        .unwrap_or(true),
                    None => is_mtime_older_than_ttl(path, ttl_ms, now_unix_ms),
                };
                if is_stale {
                    let stale_name = format!(
                        ".stale-{now_unix_ms}-{}.json",
                        std::process::id()
                    );
                    let stale_path = path.with_file_name(stale_name);
                    let _ = fs::rename(path, &stale_path);
                    broke_stale = true;
                    continue;
                }
                return Ok(AcquireOutcome::Held {
                    record: existing.unwrap_or_else(|| build_record(&metadata, now_iso, expires_iso)),
                });
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }
    Err(LockError::AttemptsExhausted)
}

/// Outcome of a guarded acquire attempt, preserving the acquired/broke-stale/
/// held distinction that the caller needs to report a lock status reason.
pub enum GuardedAcquireOutcome {
    /// The lock was acquired fresh.
    Acquired(LockGuard),
    /// A stale lock was found and broken, then the lock was acquired.
    BrokeStale(LockGuard),
    /// The lock is currently held by a live owner.
    Held(LockRecord),
}

impl GuardedAcquireOutcome {
    /// The guard, if this outcome represents a successful acquisition.
    #[must_use]
    pub fn into_guard(self) -> Option<LockGuard> {
        match self {
            Self::Acquired(g) | Self::BrokeStale(g) => Some(g),
            Self::Held(_) => None,
        }
    }
}

/// Acquire the lock and wrap it in a [`LockGuard`] that releases on drop.
///
/// # Errors
/// Returns `Err` on unexpected I/O failure or attempts exhaustion.
pub fn acquire_guarded(
    path: &Path,
    ttl_ms: i64,
    now_unix_ms: i64,
    now_iso: &str,
    expires_iso: &str,
    metadata: LockMetadata,
) -> Result<GuardedAcquireOutcome, LockError> {
    let outcome = acquire(path, ttl_ms, now_unix_ms, now_iso, expires_iso, metadata)?;
    Ok(match outcome {
        AcquireOutcome::Acquired(record) => GuardedAcquireOutcome::Acquired(LockGuard {
            path: path.to_path_buf(),
            record,
            released: false,
        }),
        AcquireOutcome::BrokeStale(record) => GuardedAcquireOutcome::BrokeStale(LockGuard {
            path: path.to_path_buf(),
            record,
            released: false,
        }),
        AcquireOutcome::Held { record } => GuardedAcquireOutcome::Held(record),
    })
}

/// Release the lock at `path`, only if `owner_token` matches the current holder.
///
/// # Errors
/// Returns an error only for unexpected I/O failure.
pub fn release(path: &Path, owner_token: &str) -> Result<ReleaseOutcome, LockError> {
    release_impl(path, owner_token)
}

fn release_impl(path: &Path, owner_token: &str) -> Result<ReleaseOutcome, LockError> {
    if !path.exists() {
        return Ok(ReleaseOutcome::Missing);
    }
    let Some(record) = read_record(path) else {
        return Ok(ReleaseOutcome::Missing);
    };
    if record.owner_token != owner_token {
        return Ok(ReleaseOutcome::NotOwner);
    }
    match fs::remove_file(path) {
        Ok(()) => Ok(ReleaseOutcome::Released),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ReleaseOutcome::Missing),
        Err(source) => Err(LockError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Metadata captured into a [`LockRecord`] at acquisition time.
#[derive(Clone, Debug)]
pub struct LockMetadata {
    pub lock_name: String,
    pub pid: u32,
    pub uid: u32,
    pub user: String,
    pub host: String,
    pub cwd: String,
    pub command: String,
    pub project_root: String,
    pub ai_project_root: String,
}

fn build_record(metadata: &LockMetadata, now_iso: &str, expires_iso: &str) -> LockRecord {
    LockRecord {
        version: 1,
        lock_name: metadata.lock_name.clone(),
        created_at: now_iso.to_owned(),
        expires_at: expires_iso.to_owned(),
        pid: metadata.pid,
        uid: metadata.uid,
        user: metadata.user.clone(),
        host: metadata.host.clone(),
        cwd: metadata.cwd.clone(),
        command: metadata.command.clone(),
        project_root: metadata.project_root.clone(),
        ai_project_root: metadata.ai_project_root.clone(),
        owner_token: random_owner_token(),
    }
}

/// 16 random bytes, hex-encoded (32 hex chars), per the lock record contract.
#[must_use]
pub fn random_owner_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_record(path: &Path) -> Option<LockRecord> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

pub(crate) fn parse_epoch_ms(iso: &str) -> Option<i64> {
    // Minimal ISO-8601 UTC parser: "YYYY-MM-DDTHH:MM:SSZ" → approximate epoch ms.
    // Precision to the second is sufficient for TTL comparisons.
    let bytes = iso.as_bytes();
    if bytes.len() < 20 {
        return None;
    }
    let year: i64 = iso.get(0..4)?.parse().ok()?;
    let month: i64 = iso.get(5..7)?.parse().ok()?;
    let day: i64 = iso.get(8..10)?.parse().ok()?;
    let hour: i64 = iso.get(11..13)?.parse().ok()?;
    let minute: i64 = iso.get(14..16)?.parse().ok()?;
    let second: i64 = iso.get(17..19)?.parse().ok()?;

    let days_from_epoch = days_from_civil(year, month, day);
    Some(((days_from_epoch * 86400) + hour * 3600 + minute * 60 + second) * 1000)
}

/// Howard Hinnant's days-from-civil algorithm (proleptic Gregorian, days since 1970-01-01).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn is_mtime_older_than_ttl(path: &Path, ttl_ms: i64, now_unix_ms: i64) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| {
            let mtime_ms = i64::try_from(d.as_millis()).unwrap_or(i64::MAX);
            now_unix_ms - mtime_ms >= ttl_ms
        })
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> LockMetadata {
        LockMetadata {
            lock_name: "lane-a-orchestrate".to_owned(),
            pid: 1234,
            uid: 0,
            user: "tester".to_owned(),
            host: "localhost".to_owned(),
            cwd: "/tmp".to_owned(),
            command: "lanekeeper orchestrate".to_owned(),
            project_root: "/proj".to_owned(),
            ai_project_root: "/proj/ai".to_owned(),
        }
    }

    #[test]
    fn first_acquire_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        let outcome = acquire(
            &path,
            480_000,
            1_000_000,
            "2026-08-01T00:00:00Z",
            "2026-08-01T00:08:00Z",
            metadata(),
        )
        .unwrap();
        assert!(outcome.acquired());
        assert!(path.exists());
    }

    #[test]
    fn second_acquire_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        acquire(&path, 480_000, 0, "2026-08-01T00:00:00Z", "2026-08-01T00:08:00Z", metadata())
            .unwrap();
        let outcome = acquire(
            &path,
            480_000,
            1_000,
            "2026-08-01T00:00:01Z",
            "2026-08-01T00:08:01Z",
            metadata(),
        )
        .unwrap();
        assert!(!outcome.acquired());
        assert!(matches!(outcome, AcquireOutcome::Held { .. }));
    }

    #[test]
    fn expired_lock_is_broken_and_reacquired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        acquire(&path, 1000, 0, "2026-08-01T00:00:00Z", "2026-08-01T00:00:01Z", metadata())
            .unwrap();

        // now is far past expires_at
        let now_far_future_ms = 10_000_000;
        let outcome = acquire(
            &path,
            1000,
            now_far_future_ms,
            "2026-08-01T03:00:00Z",
            "2026-08-01T03:00:01Z",
            metadata(),
        )
        .unwrap();
        assert!(matches!(outcome, AcquireOutcome::BrokeStale(_)));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".stale-"))
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn release_with_matching_token_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        let outcome = acquire(
            &path,
            480_000,
            0,
            "2026-08-01T00:00:00Z",
            "2026-08-01T00:08:00Z",
            metadata(),
        )
        .unwrap();
        let record = match outcome {
            AcquireOutcome::Acquired(r) => r,
            other => panic!("unexpected outcome: {other:?}"),
        };
        let result = release(&path, &record.owner_token).unwrap();
        assert_eq!(result, ReleaseOutcome::Released);
        assert!(!path.exists());
    }

    #[test]
    fn release_with_wrong_token_is_not_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        acquire(&path, 480_000, 0, "2026-08-01T00:00:00Z", "2026-08-01T00:08:00Z", metadata())
            .unwrap();
        let result = release(&path, "wrong-token").unwrap();
        assert_eq!(result, ReleaseOutcome::NotOwner);
        assert!(path.exists());
    }

    #[test]
    fn release_missing_lock_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        let result = release(&path, "any-token").unwrap();
        assert_eq!(result, ReleaseOutcome::Missing);
    }

    #[test]
    fn guard_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        {
            let outcome = acquire_guarded(
                &path,
                480_000,
                0,
                "2026-08-01T00:00:00Z",
                "2026-08-01T00:08:00Z",
                metadata(),
            )
            .unwrap();
            let _guard = outcome.into_guard().expect("lock was free");
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn guarded_held_outcome_carries_no_guard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lane-a-orchestrate.lock.json");
        acquire(&path, 480_000, 0, "2026-08-01T00:00:00Z", "2026-08-01T00:08:00Z", metadata())
            .unwrap();
        let outcome = acquire_guarded(
            &path,
            480_000,
            1_000,
            "2026-08-01T00:00:01Z",
            "2026-08-01T00:08:01Z",
            metadata(),
        )
        .unwrap();
        assert!(matches!(outcome, GuardedAcquireOutcome::Held(_)));
        assert!(outcome.into_guard().is_none());
    }

    #[test]
    fn owner_token_is_32_hex_chars() {
        let token = random_owner_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_epoch_ms_known_value() {
        // 1970-01-01T00:00:00Z is epoch 0.
        assert_eq!(parse_epoch_ms("1970-01-01T00:00:00Z"), Some(0));
    }
}
