//! Config validation.

use super::EngineConfig;
use crate::error::ConfigError;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Upper bound on the SQLite busy timeout (10 minutes)
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;

/// Validate every field of the engine config.
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "database_path cannot be empty".to_string(),
        ));
    }
    if config.log_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "log_dir cannot be empty".to_string(),
        ));
    }
    if let Some(catalog) = &config.catalog_path {
        if catalog.extension().map_or(true, |ext| ext != "json") {
            return Err(ConfigError::ValidationFailed(format!(
                "catalog_path must point to a .json seed, got {}",
                catalog.display()
            )));
        }
    }

    validate_labels(&config.initial_feedback_status, &config.applied_feedback_status)?;
    validate_busy_timeout(config.busy_timeout_ms)?;

    if !LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationFailed(format!(
            "log_level must be one of {:?}, got '{}'",
            LOG_LEVELS, config.log_level
        )));
    }
    Ok(())
}

/// Feedback labels must be present and distinguishable.
pub fn validate_labels(initial: &str, applied: &str) -> Result<(), ConfigError> {
    if initial.trim().is_empty() || applied.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Feedback status labels cannot be empty".to_string(),
        ));
    }
    if initial.trim() == applied.trim() {
        return Err(ConfigError::ValidationFailed(format!(
            "Initial and applied feedback labels must differ, both are '{}'",
            initial
        )));
    }
    Ok(())
}

pub fn validate_busy_timeout(ms: u64) -> Result<(), ConfigError> {
    if ms == 0 || ms > MAX_BUSY_TIMEOUT_MS {
        return Err(ConfigError::ValidationFailed(format!(
            "busy_timeout_ms must be between 1 and {}, got {}",
            MAX_BUSY_TIMEOUT_MS, ms
        )));
    }
    Ok(())
}
