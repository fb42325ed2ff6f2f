//! Configuration for the diagnosis engine.
//!
//! # Module Structure
//!
//! - `loader`: reads `EngineConfig` from `.json` or `.toml` files and writes it back
//! - `validator`: rejects unusable values before the store is opened
//!
//! Every field has a default, so a partial file (or none at all) is enough
//! to start the engine.

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Feedback-status label written when a round is committed
pub const DEFAULT_INITIAL_FEEDBACK_STATUS: &str = "Expert feedback not yet incorporated";
/// Feedback-status label written once expert feedback has been applied
pub const DEFAULT_APPLIED_FEEDBACK_STATUS: &str = "Expert feedback incorporated";

/// Engine settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory for session and audit logs
    pub log_dir: PathBuf,
    /// Question-bank seed imported at startup, when set
    pub catalog_path: Option<PathBuf>,
    pub initial_feedback_status: String,
    pub applied_feedback_status: String,
    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
    /// Mirror log lines to stderr
    pub log_to_stderr: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = loader::default_data_dir();
        EngineConfig {
            database_path: data_dir.join("diagnosis.db"),
            log_dir: data_dir.join("logs"),
            catalog_path: None,
            initial_feedback_status: DEFAULT_INITIAL_FEEDBACK_STATUS.to_string(),
            applied_feedback_status: DEFAULT_APPLIED_FEEDBACK_STATUS.to_string(),
            busy_timeout_ms: 5_000,
            log_level: "info".to_string(),
            log_to_stderr: false,
        }
    }
}

impl EngineConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Short human-readable summary, logged at startup
    pub fn summary(&self) -> String {
        format!(
            "database={} logs={} catalog={} busy_timeout={}ms level={}",
            self.database_path.display(),
            self.log_dir.display(),
            self.catalog_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.busy_timeout_ms,
            self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_feedback_status, DEFAULT_INITIAL_FEEDBACK_STATUS);
        assert_eq!(config.applied_feedback_status, DEFAULT_APPLIED_FEEDBACK_STATUS);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.database_path.ends_with("diagnosis.db"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"busy_timeout_ms": 250, "log_level": "debug"}"#).unwrap();
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.initial_feedback_status, DEFAULT_INITIAL_FEEDBACK_STATUS);
    }

    #[test]
    fn test_summary_mentions_database() {
        let config = EngineConfig {
            database_path: PathBuf::from("/tmp/x.db"),
            ..EngineConfig::default()
        };
        assert!(config.summary().contains("/tmp/x.db"));
        assert!(config.summary().contains("catalog=-"));
    }
}
