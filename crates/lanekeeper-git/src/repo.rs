//! The [`GitRepo`] trait — the single abstraction boundary between the indexer and git.
//!
//! The repo indexer (see `lanekeeper_core::indexer`) never writes to the
//! repositories it inspects. This trait exposes exactly the read operations
//! that indexing one commit requires, and nothing else: resolving a revision,
//! reading a commit's metadata, walking a tree, and reading blob bytes.
//!
//! # Object safety
//!
//! This trait is object-safe: no generic methods, no `Self` in return position
//! outside of `Result`. Callers may use `&dyn GitRepo` or `Box<dyn GitRepo>`.
use crate::error::GitError;
use crate::types::{CommitInfo, GitOid, TreeEntry};

pub trait GitRepo {
    /// Resolve a revision specification (branch name, `HEAD`, short/long sha) to an OID.
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    /// Like [`rev_parse`](Self::rev_parse) but returns `None` instead of an
    /// error when the spec cannot be resolved.
    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    /// Read a commit object's metadata (tree, parents, message, signatures, committer time).
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    /// Read the entries of a tree object, one level deep (not recursive).
    ///
    /// Callers recurse into subtree entries (`EntryMode::Tree`) themselves to
    /// build a full, path-qualified file listing.
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read the contents of a blob object.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;
}
