//! Config file loader and serialization.

use super::validator;
use super::EngineConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "privacy-diagnosis";

/// Default config file: ~/.config/privacy-diagnosis/engine.toml
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine config directory".to_string())
    })?;
    Ok(config_dir.join(APP_DIR).join("engine.toml"))
}

/// Data directory for the database and logs, falling back to ./data
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Supported config formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

/// Validate config path (.json or .toml extension required).
pub fn config_format(path: &Path) -> Result<ConfigFormat, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(ext) => Err(ConfigError::ValidationFailed(format!(
            "Configuration file must have .json or .toml extension, got .{}",
            ext
        ))),
        None => Err(ConfigError::ValidationFailed(
            "Configuration file must have .json or .toml extension".to_string(),
        )),
    }
}

/// Load and validate config from a JSON or TOML file.
pub fn load_config_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let format = config_format(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config: EngineConfig = match format {
        ConfigFormat::Json => serde_json::from_str(&content)?,
        ConfigFormat::Toml => toml::from_str(&content)?,
    };

    validator::validate_config(&config)?;
    Ok(config)
}

/// Load an explicit config file, or the default one when it exists, or defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let path = default_config_path()?;
    if path.exists() {
        load_config_from_file(&path)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Save config as pretty JSON.
pub fn save_config_to_file(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json_content = serde_json::to_string_pretty(config)?;
    fs::write(path, json_content)?;
    Ok(())
}
