//! Read-only git object store access for lanekeeper's repo indexer.
//!
//! This crate defines the [`GitRepo`] trait — the single interface through
//! which the core crate touches git. No other lanekeeper crate should import
//! gix directly; they depend on `lanekeeper-git` and program against the
//! trait. The indexer never writes to the repositories it inspects, so this
//! crate carries only the read operations one commit's worth of indexing
//! needs: revision resolution, commit metadata, tree listing, and blob reads.
//!
//! # Crate layout
//!
//! - [`repo`] — the [`GitRepo`] trait definition.
//! - [`types`] — value types used in trait signatures ([`GitOid`], [`TreeEntry`], [`CommitInfo`]).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.
//! - [`gix_repo`] — the gix-backed implementation.

mod gix_repo;
mod objects_impl;
mod refs_impl;

pub mod error;
pub mod repo;
pub mod types;

pub use error::GitError;
pub use gix_repo::GixRepo;
pub use repo::GitRepo;
pub use types::{CommitInfo, EntryMode, GitOid, OidParseError, TreeEntry};
