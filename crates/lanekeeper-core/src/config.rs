//! Configuration for the Lane A orchestrator and its collaborators.
//!
//! Loaded from an optional TOML file and layered with environment-variable
//! overrides (the variables named in the external-interfaces contract).
//! Unknown keys are rejected at the file layer so typos surface immediately
//! rather than silently falling back to defaults.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The escalation mode used when a repo's soft-stale age crosses the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalateMode {
    /// Open (or reuse) a repo-scoped update meeting via the external meetings collaborator.
    UpdateMeeting,
    /// Write a standalone decision-packet markdown file.
    DecisionPacket,
}

impl Default for EscalateMode {
    fn default() -> Self {
        Self::UpdateMeeting
    }
}

impl std::fmt::Display for EscalateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdateMeeting => write!(f, "update_meeting"),
            Self::DecisionPacket => write!(f, "decision_packet"),
        }
    }
}

impl std::str::FromStr for EscalateMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_meeting" => Ok(Self::UpdateMeeting),
            "decision_packet" => Ok(Self::DecisionPacket),
            other => Err(format!(
                "invalid escalate mode {other:?}: expected \"update_meeting\" or \"decision_packet\""
            )),
        }
    }
}

/// Soft-stale escalation policy options (see the staleness & escalation component).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StalenessConfig {
    /// Prepend a soft-stale banner to writer markdown outputs.
    pub banner_enabled: bool,
    /// Minimum `first_seen_at` age, in minutes, before a soft-stale repo is escalated.
    pub escalate_after_minutes: u32,
    /// Which kind of artifact an escalation produces.
    pub escalate_mode: EscalateMode,
    /// Max escalations per UTC day across all repos.
    pub escalate_cap_per_day: u32,
    /// Age, in hours, after which a repo's last scan is considered `scan_older_than_window`.
    pub scan_older_than_window_hours: u32,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            banner_enabled: true,
            escalate_after_minutes: 180,
            escalate_mode: EscalateMode::UpdateMeeting,
            escalate_cap_per_day: 3,
            scan_older_than_window_hours: 24,
        }
    }
}

/// Lane A lock manager options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LockConfig {
    /// Lock TTL in milliseconds. Non-positive values fall back to the default.
    pub ttl_ms: i64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl_ms: 480_000 }
    }
}

impl LockConfig {
    /// The effective TTL, falling back to the default when non-positive.
    #[must_use]
    pub fn effective_ttl_ms(&self) -> i64 {
        if self.ttl_ms <= 0 {
            Self::default().ttl_ms
        } else {
            self.ttl_ms
        }
    }
}

/// Root Lane A configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct LaneAConfig {
    /// Lock manager options.
    pub lock: LockConfig,
    /// Staleness and escalation options.
    pub staleness: StalenessConfig,
}

/// Error loading or overriding configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io { path: String, source: std::io::Error },
    /// The config file's TOML was malformed or had unknown/invalid fields.
    Parse { path: String, message: String },
    /// An environment-variable override had an invalid value.
    InvalidEnvVar { var: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file {path}: {source}. To fix: ensure the file exists and is readable, or omit it to use defaults.")
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse config file {path}: {message}. To fix: check the TOML syntax and remove any unrecognized keys.")
            }
            Self::InvalidEnvVar { var, message } => {
                write!(f, "invalid value for {var}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl LaneAConfig {
    /// Load configuration from an optional TOML file, then apply environment
    /// variable overrides. Missing file is not an error — defaults apply.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or if an environment variable override has an invalid value.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                toml::from_str(&text).map_err(|e| ConfigError::Parse {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var("LANE_A_LOCK_TTL_MS") {
            self.lock.ttl_ms = v.parse().map_err(|_| ConfigError::InvalidEnvVar {
                var: "LANE_A_LOCK_TTL_MS".to_owned(),
                message: format!("expected an integer, got {v:?}"),
            })?;
        }
        if let Ok(v) = env::var("LANE_A_SOFT_STALE_BANNER") {
            self.staleness.banner_enabled = parse_bool(&v).ok_or_else(|| ConfigError::InvalidEnvVar {
                var: "LANE_A_SOFT_STALE_BANNER".to_owned(),
                message: format!("expected a boolean, got {v:?}"),
            })?;
        }
        if let Ok(v) = env::var("LANE_A_SOFT_STALE_ESCALATE_AFTER_MINUTES") {
            self.staleness.escalate_after_minutes =
                v.parse().map_err(|_| ConfigError::InvalidEnvVar {
                    var: "LANE_A_SOFT_STALE_ESCALATE_AFTER_MINUTES".to_owned(),
                    message: format!("expected an integer, got {v:?}"),
                })?;
        }
        if let Ok(v) = env::var("LANE_A_SOFT_STALE_ESCALATE_MODE") {
            self.staleness.escalate_mode = v.parse().map_err(|message| ConfigError::InvalidEnvVar {
                var: "LANE_A_SOFT_STALE_ESCALATE_MODE".to_owned(),
                message,
            })?;
        }
        if let Ok(v) = env::var("LANE_A_SOFT_STALE_ESCALATE_CAP_PER_DAY") {
            self.staleness.escalate_cap_per_day =
                v.parse().map_err(|_| ConfigError::InvalidEnvVar {
                    var: "LANE_A_SOFT_STALE_ESCALATE_CAP_PER_DAY".to_owned(),
                    message: format!("expected an integer, got {v:?}"),
                })?;
        }
        Ok(())
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = LaneAConfig::default();
        assert_eq!(config.lock.ttl_ms, 480_000);
        assert!(config.staleness.banner_enabled);
        assert_eq!(config.staleness.escalate_after_minutes, 180);
        assert_eq!(config.staleness.escalate_mode, EscalateMode::UpdateMeeting);
        assert_eq!(config.staleness.escalate_cap_per_day, 3);
    }

    #[test]
    fn non_positive_ttl_falls_back_to_default() {
        let mut config = LockConfig::default();
        config.ttl_ms = 0;
        assert_eq!(config.effective_ttl_ms(), 480_000);
        config.ttl_ms = -5;
        assert_eq!(config.effective_ttl_ms(), 480_000);
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanekeeper.toml");
        std::fs::write(
            &path,
            "[staleness]\nescalate_cap_per_day = 10\nescalate_mode = \"decision_packet\"\n",
        )
        .unwrap();
        let config = LaneAConfig::load(Some(&path)).unwrap();
        assert_eq!(config.staleness.escalate_cap_per_day, 10);
        assert_eq!(config.staleness.escalate_mode, EscalateMode::DecisionPacket);
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanekeeper.toml");
        std::fs::write(&path, "unknown_top_level_key = true\n").unwrap();
        assert!(LaneAConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = LaneAConfig::load(Some(Path::new("/nonexistent/path.toml"))).unwrap();
        assert_eq!(config, LaneAConfig::default());
    }
}
