//! CLI crate for the orchestrator binary.

pub mod commands;
pub mod telemetry;
