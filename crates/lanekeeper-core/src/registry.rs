//! Repository registry: the set of repos Lane A knows about (§3.1).

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::RepoId;

/// Lifecycle status of a registered repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Active,
    Inactive,
    Removed,
}

/// One entry in the repository registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub repo_id: RepoId,
    /// Path relative to the repos root.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_branch: Option<String>,
    pub status: RepoStatus,
}

/// The full registry, keyed by `repo_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    repos: BTreeMap<String, RepoEntry>,
}

/// An error loading or validating the registry.
#[derive(Debug)]
pub enum RegistryError {
    Read { path: String, source: std::io::Error },
    Parse { path: String, message: String },
    DuplicateRepoId { repo_id: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read registry {path}: {source}"),
            Self::Parse { path, message } => write!(f, "failed to parse registry {path}: {message}"),
            Self::DuplicateRepoId { repo_id } => {
                write!(f, "duplicate repo_id in registry: {repo_id}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl Registry {
    /// Load a registry from a JSON file listing `RepoEntry` objects.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, parsed, or contains a
    /// duplicate `repo_id`.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<RepoEntry> = serde_json::from_str(&text).map_err(|e| RegistryError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut repos = BTreeMap::new();
        for entry in entries {
            let key = entry.repo_id.as_str().to_owned();
            if repos.insert(key.clone(), entry).is_some() {
                return Err(RegistryError::DuplicateRepoId { repo_id: key });
            }
        }
        Ok(Self { repos })
    }

    /// All entries with `status == Active`, sorted by `repo_id`.
    #[must_use]
    pub fn active(&self) -> Vec<&RepoEntry> {
        self.repos
            .values()
            .filter(|e| e.status == RepoStatus::Active)
            .collect()
    }

    /// Look up an entry by id regardless of status.
    #[must_use]
    pub fn get(&self, repo_id: &str) -> Option<&RepoEntry> {
        self.repos.get(repo_id)
    }

    /// True if `repo_id` names an active repo.
    #[must_use]
    pub fn is_active(&self, repo_id: &str) -> bool {
        self.repos
            .get(repo_id)
            .is_some_and(|e| e.status == RepoStatus::Active)
    }

    /// Resolve an active entry's filesystem path under `repos_root`.
    #[must_use]
    pub fn resolve_path(&self, repos_root: &Path, repo_id: &str) -> Option<PathBuf> {
        self.repos.get(repo_id).map(|e| repos_root.join(&e.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_registry(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("registry.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_filters_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_registry(
            dir.path(),
            r#"[
                {"repo_id":"repo-a","path":"repo-a","status":"active"},
                {"repo_id":"repo-b","path":"repo-b","status":"inactive"}
            ]"#,
        );
        let registry = Registry::load(&path).unwrap();
        let active = registry.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].repo_id.as_str(), "repo-a");
        assert!(registry.is_active("repo-a"));
        assert!(!registry.is_active("repo-b"));
        assert!(!registry.is_active("repo-missing"));
    }

    #[test]
    fn rejects_duplicate_repo_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_registry(
            dir.path(),
            r#"[
                {"repo_id":"repo-a","path":"a","status":"active"},
                {"repo_id":"repo-a","path":"a2","status":"active"}
            ]"#,
        );
        let result = Registry::load(&path);
        assert!(matches!(result, Err(RegistryError::DuplicateRepoId { .. })));
    }

    #[test]
    fn resolves_path_under_repos_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_registry(
            dir.path(),
            r#"[{"repo_id":"repo-a","path":"nested/repo-a","status":"active"}]"#,
        );
        let registry = Registry::load(&path).unwrap();
        let resolved = registry.resolve_path(Path::new("/repos"), "repo-a").unwrap();
        assert_eq!(resolved, Path::new("/repos/nested/repo-a"));
    }
}
