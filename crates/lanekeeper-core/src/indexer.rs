//! Repo indexer (§4.4): produces a deterministic per-repo index and
//! fingerprint file from a specific git reference, without modifying the repo.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use lanekeeper_git::{EntryMode, GitError, GitOid, GitRepo};

use crate::atomic::write_atomic;
use crate::ids::RepoId;
use crate::paths::OpsLayout;

/// A repo's build command, named and tied to evidence of how it was detected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommand {
    /// What the command does: `install`, `lint`, `test`, or `build`.
    pub kind: String,
    /// The command line itself.
    pub command: String,
    /// The file whose presence or content justified detecting this command.
    pub evidence_file: String,
}

/// A detected API surface entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSurfaceEntry {
    /// `openapi`, `route`, or `event_topic`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// The path or identifier this entry refers to.
    pub target: String,
}

/// A cross-repo dependency reference.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrossRepoDependency {
    /// The dependent repo id, if it matches internal naming.
    pub repo_id: String,
    /// Where this dependency evidence came from (e.g. `package.json`, `pom.xml`).
    pub evidence: String,
}

/// One fingerprinted file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintFile {
    pub path: String,
    pub sha256: String,
    pub category: String,
}

/// `repo_fingerprints.json` contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFingerprints {
    pub repo_id: RepoId,
    pub captured_at: String,
    pub files: Vec<FingerprintFile>,
}

/// `repo_index.json` contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIndex {
    pub repo_id: RepoId,
    pub head_sha: String,
    pub scanned_at: String,
    pub languages: Vec<String>,
    pub entrypoints: Vec<String>,
    pub build_commands: Vec<BuildCommand>,
    pub api_surface: Vec<ApiSurfaceEntry>,
    pub migrations_schema: Vec<String>,
    pub cross_repo_dependencies: Vec<CrossRepoDependency>,
    pub hotspots: Vec<String>,
    pub fingerprints: BTreeMap<String, FingerprintSha>,
}

/// A fingerprint's sha under `RepoIndex.fingerprints`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSha {
    pub sha256: String,
}

/// Successful indexing result.
#[derive(Clone, Debug)]
pub struct IndexOutcome {
    pub repo_index: RepoIndex,
    pub repo_fingerprints: RepoFingerprints,
    pub index_path: PathBuf,
    pub fingerprints_path: PathBuf,
}

/// An error indexing a repo.
#[derive(Debug)]
pub enum IndexError {
    /// The path is not a git worktree, or the ref couldn't be resolved.
    Git(GitError),
    /// A tracked path failed the path-safety check (absolute, `..`, or `\`).
    UnsafePath { path: String },
    /// No fingerprintable files were found — the spec requires at least one.
    NoFingerprints,
    /// The fingerprints-consistency invariant was violated during assembly.
    FingerprintMismatch,
    /// Writing the output files failed.
    Write { path: String, source: std::io::Error },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(e) => write!(f, "git error while indexing: {e}"),
            Self::UnsafePath { path } => write!(f, "refusing unsafe tracked path: {path:?}"),
            Self::NoFingerprints => write!(f, "no fingerprintable files found in repo"),
            Self::FingerprintMismatch => {
                write!(f, "repo_index fingerprints and repo_fingerprints.files disagree")
            }
            Self::Write { path, source } => write!(f, "failed to write {path}: {source}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<GitError> for IndexError {
    fn from(e: GitError) -> Self {
        Self::Git(e)
    }
}

/// Index `repo_id` at `repo_path` (opened via `repo`), writing outputs under
/// the layout's per-repo output directory.
///
/// `active_branch` is the configured branch to resolve, falling back to
/// `HEAD` when absent.
///
/// # Errors
/// Returns [`IndexError`] if the ref can't be resolved, tracked paths fail
/// the safety check, no fingerprintable files exist, or the output can't be
/// written. On error the caller is expected to write an error artifact under
/// the layout's error directory; this function itself performs no cleanup of
/// partial output beyond not writing a half-formed pair.
pub fn index_repo(
    repo: &dyn GitRepo,
    repo_id: &RepoId,
    active_branch: Option<&str>,
    layout: &OpsLayout,
    dry_run: bool,
) -> Result<IndexOutcome, IndexError> {
    let head = repo.rev_parse(active_branch.unwrap_or("HEAD"))?;
    let commit = repo.read_commit(head)?;
    let scanned_at = unix_to_iso8601(commit.committer_time);

    let mut paths = Vec::new();
    collect_paths(repo, commit.tree_oid, "", &mut paths)?;
    paths.sort();

    let package_json = paths
        .iter()
        .find(|(path, _)| path == "package.json")
        .map(|(_, oid)| repo.read_blob(*oid))
        .transpose()?
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok());

    let languages = detect_languages(&paths);
    let entrypoints = detect_entrypoints(&paths);
    let build_commands = detect_build_commands(&paths, package_json.as_ref());
    let api_surface = detect_api_surface(&paths);
    let migrations_schema = detect_migrations(&paths);
    let cross_repo_dependencies = detect_cross_repo_dependencies(&paths, package_json.as_ref());
    let mut hotspots: BTreeSet<String> = entrypoints.iter().cloned().collect();
    hotspots.extend(api_surface.iter().map(|e| e.target.clone()));
    let hotspots: Vec<String> = hotspots.into_iter().collect();

    let fingerprint_paths = select_fingerprint_files(&paths);
    if fingerprint_paths.is_empty() {
        return Err(IndexError::NoFingerprints);
    }

    let mut files = Vec::with_capacity(fingerprint_paths.len());
    let mut fingerprints_map = BTreeMap::new();
    for (path, oid, category) in &fingerprint_paths {
        let bytes = repo.read_blob(*oid)?;
        let sha256 = sha256_hex(&bytes);
        files.push(FingerprintFile {
            path: path.clone(),
            sha256: sha256.clone(),
            category: category.clone(),
        });
        fingerprints_map.insert(path.clone(), FingerprintSha { sha256 });
    }
    files.sort_by(|a, b| (&a.category, &a.path).cmp(&(&b.category, &b.path)));

    let repo_index = RepoIndex {
        repo_id: repo_id.clone(),
        head_sha: head.to_string(),
        scanned_at: scanned_at.clone(),
        languages,
        entrypoints,
        build_commands,
        api_surface,
        migrations_schema,
        cross_repo_dependencies,
        hotspots,
        fingerprints: fingerprints_map,
    };
    let repo_fingerprints = RepoFingerprints {
        repo_id: repo_id.clone(),
        captured_at: scanned_at,
        files,
    };

    let index_key_set: BTreeSet<&String> = repo_index.fingerprints.keys().collect();
    let fp_key_set: BTreeSet<&String> = repo_fingerprints.files.iter().map(|f| &f.path).collect();
    if index_key_set != fp_key_set {
        return Err(IndexError::FingerprintMismatch);
    }
    for file in &repo_fingerprints.files {
        if repo_index.fingerprints.get(&file.path).map(|f| &f.sha256) != Some(&file.sha256) {
            return Err(IndexError::FingerprintMismatch);
        }
    }

    let index_path = layout.repo_index_json(repo_id);
    let fingerprints_path = layout.repo_fingerprints_json(repo_id);

    if !dry_run {
        let index_json = serde_json::to_vec_pretty(&repo_index).unwrap_or_default();
        write_atomic(&index_path, &index_json).map_err(|source| IndexError::Write {
            path: index_path.display().to_string(),
            source,
        })?;
        let fp_json = serde_json::to_vec_pretty(&repo_fingerprints).unwrap_or_default();
        write_atomic(&fingerprints_path, &fp_json).map_err(|source| IndexError::Write {
            path: fingerprints_path.display().to_string(),
            source,
        })?;
    }

    Ok(IndexOutcome {
        repo_index,
        repo_fingerprints,
        index_path,
        fingerprints_path,
    })
}

fn collect_paths(
    repo: &dyn GitRepo,
    tree_oid: GitOid,
    prefix: &str,
    out: &mut Vec<(String, GitOid)>,
) -> Result<(), IndexError> {
    for entry in repo.read_tree(tree_oid)? {
        let full_path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if full_path.starts_with('/') || full_path.contains("..") || full_path.contains('\\') {
            return Err(IndexError::UnsafePath { path: full_path });
        }
        match entry.mode {
            EntryMode::Tree => collect_paths(repo, entry.oid, &full_path, out)?,
            EntryMode::Commit => {}
            _ => out.push((full_path, entry.oid)),
        }
    }
    Ok(())
}

fn detect_languages(paths: &[(String, GitOid)]) -> Vec<String> {
    let mut langs: BTreeSet<String> = BTreeSet::new();
    for (path, _) in paths {
        let lang = match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("rs") => Some("rust"),
            Some("ts" | "tsx") => Some("typescript"),
            Some("js" | "jsx") => Some("javascript"),
            Some("py") => Some("python"),
            Some("go") => Some("go"),
            Some("java") => Some("java"),
            Some("rb") => Some("ruby"),
            _ => None,
        };
        if let Some(lang) = lang {
            langs.insert(lang.to_owned());
        }
    }
    langs.into_iter().collect()
}

fn detect_entrypoints(paths: &[(String, GitOid)]) -> Vec<String> {
    const CANDIDATES: &[&str] = &[
        "src/main.rs",
        "src/index.ts",
        "src/index.js",
        "index.ts",
        "index.js",
        "main.py",
        "main.go",
        "cmd/main.go",
    ];
    let mut found: Vec<String> = paths
        .iter()
        .filter(|(path, _)| CANDIDATES.contains(&path.as_str()))
        .map(|(path, _)| path.clone())
        .collect();
    found.sort();
    found
}

fn detect_build_commands(
    paths: &[(String, GitOid)],
    package_json: Option<&serde_json::Value>,
) -> Vec<BuildCommand> {
    let mut commands = Vec::new();
    if let Some(pkg) = package_json {
        if let Some(scripts) = pkg.get("scripts").and_then(|v| v.as_object()) {
            for (kind, key) in [
                ("install", "preinstall"),
                ("lint", "lint"),
                ("test", "test"),
                ("build", "build"),
            ] {
                if let Some(command) = scripts.get(key).and_then(|v| v.as_str()) {
                    commands.push(BuildCommand {
                        kind: kind.to_owned(),
                        command: command.to_owned(),
                        evidence_file: "package.json".to_owned(),
                    });
                }
            }
        }
        if commands.iter().all(|c| c.kind != "install") {
            commands.push(BuildCommand {
                kind: "install".to_owned(),
                command: "npm install".to_owned(),
                evidence_file: "package.json".to_owned(),
            });
        }
    }
    if paths.iter().any(|(p, _)| p == "Cargo.toml") {
        commands.push(BuildCommand {
            kind: "build".to_owned(),
            command: "cargo build".to_owned(),
            evidence_file: "Cargo.toml".to_owned(),
        });
        commands.push(BuildCommand {
            kind: "test".to_owned(),
            command: "cargo test".to_owned(),
            evidence_file: "Cargo.toml".to_owned(),
        });
    }
    commands.sort_by(|a, b| (&a.kind, &a.command).cmp(&(&b.kind, &b.command)));
    commands
}

fn detect_api_surface(paths: &[(String, GitOid)]) -> Vec<ApiSurfaceEntry> {
    let mut entries = Vec::new();
    for (path, _) in paths {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with("openapi.yaml")
            || lower.ends_with("openapi.yml")
            || lower.ends_with("openapi.json")
        {
            entries.push(ApiSurfaceEntry {
                entry_type: "openapi".to_owned(),
                target: path.clone(),
            });
        } else if lower.contains("/routes/") || lower.contains("/controllers/") {
            entries.push(ApiSurfaceEntry {
                entry_type: "route".to_owned(),
                target: path.clone(),
            });
        } else if lower.contains("/topics/") || lower.contains("event_topic") {
            entries.push(ApiSurfaceEntry {
                entry_type: "event_topic".to_owned(),
                target: path.clone(),
            });
        }
    }
    entries.sort_by(|a, b| (&a.entry_type, &a.target).cmp(&(&b.entry_type, &b.target)));
    entries
}

fn detect_migrations(paths: &[(String, GitOid)]) -> Vec<String> {
    let mut out: Vec<String> = paths
        .iter()
        .filter(|(path, _)| {
            let lower = path.to_ascii_lowercase();
            lower.contains("/migrations/") || lower.ends_with("schema.sql") || lower.contains("/schema/")
        })
        .map(|(path, _)| path.clone())
        .collect();
    out.sort();
    out
}

fn detect_cross_repo_dependencies(
    paths: &[(String, GitOid)],
    package_json: Option<&serde_json::Value>,
) -> Vec<CrossRepoDependency> {
    let mut deps = BTreeSet::new();
    if let Some(pkg) = package_json {
        if let Some(dependencies) = pkg.get("dependencies").and_then(|v| v.as_object()) {
            for name in dependencies.keys() {
                if let Some(repo_name) = name.strip_prefix("@internal/") {
                    deps.insert(CrossRepoDependency {
                        repo_id: repo_name.to_owned(),
                        evidence: "package.json".to_owned(),
                    });
                }
            }
        }
    }
    for (path, _) in paths {
        if path.ends_with("pom.xml") || path.ends_with("build.gradle") {
            deps.insert(CrossRepoDependency {
                repo_id: format!("evidence-in-{path}"),
                evidence: path.clone(),
            });
        }
    }
    deps.into_iter().collect()
}

fn select_fingerprint_files(paths: &[(String, GitOid)]) -> Vec<(String, GitOid, String)> {
    let mut out = Vec::new();
    for (path, oid) in paths {
        let lower = path.to_ascii_lowercase();
        let category = if lower.ends_with("openapi.yaml") || lower.ends_with("openapi.json") {
            Some("api_contract")
        } else if lower.contains("/migrations/") || lower.ends_with("schema.sql") {
            Some("migration")
        } else if lower.ends_with("schema.json") || lower.contains("/schema/") {
            Some("schema")
        } else if matches!(
            Path::new(path).extension().and_then(|e| e.to_str()),
            Some("rs" | "ts" | "tsx" | "js" | "jsx" | "py" | "go" | "java" | "rb")
        ) {
            Some("source")
        } else {
            None
        };
        if let Some(category) = category {
            out.push((path.clone(), *oid, category.to_owned()));
        }
    }
    out
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Render a Unix timestamp as ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SSZ`).
fn unix_to_iso8601(unix_seconds: i64) -> String {
    let days = unix_seconds.div_euclid(86400);
    let secs_of_day = unix_seconds.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

/// Howard Hinnant's civil-from-days algorithm (inverse of days-from-civil).
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}
