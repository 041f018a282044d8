//! Public re-export hub for `lanekeeper-core`. This crate has no logic of
//! its own — it exists so downstream consumers depend on one crate name
//! while the workspace stays split into `lanekeeper-core` (domain) and
//! `lanekeeper-git` (read-only git access).

pub use lanekeeper_core::*;
