//! Atomic file writes: write to a uniquely-named temp file in the same
//! directory, fsync, then rename over the destination. Readers never observe
//! a partially written file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TMP_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Write `contents` to `path` atomically.
///
/// Creates a temp file (`.tmp.{pid}.{counter-hex}`) next to `path`, writes
/// and fsyncs it, then renames it into place. On any failure the temp file is
/// removed if it was created, and `path` is left untouched.
///
/// # Errors
/// Returns the underlying I/O error from creating, writing, fsyncing, or
/// renaming the temp file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = temp_path(dir, path);

    let result = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        io::Write::write_all(&mut file, contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path(dir: &Path, target: &Path) -> PathBuf {
    let pid = std::process::id();
    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    dir.join(format!(".{file_name}.tmp.{pid}.{nanos:x}{counter:x}"))
}
