//! Unified error type hierarchy for the diagnosis engine
//!
//! Provides structured error handling with ConfigError for startup and
//! DiagnosisError for every engine operation.

use std::io;
use thiserror::Error;

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Engine error taxonomy.
///
/// Every variant maps to a stable `kind()` string so that the command
/// surface can return a structured message. Conflicts never appear here:
/// re-submissions are absorbed by upserts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosisError {
    /// Invalid value for a present field (e.g. round 0, empty batch)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Required identity field absent from a request
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Question number not present in the battery's catalog
    #[error("Unknown {battery} question number: {number}")]
    UnknownQuestion { battery: String, number: u32 },

    /// Unknown system, result set or other addressed entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Round completion attempted before the intake record was saved
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Requested round has no committed result
    #[error("Round {round} has no committed result")]
    RoundNotFound { round: u32 },

    /// No caller identity, or the wrong kind of identity
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Storage failure; any open transaction has been rolled back
    #[error("Internal storage failure: {0}")]
    Transaction(String),
}

impl DiagnosisError {
    pub fn missing(field: impl Into<String>) -> Self {
        DiagnosisError::MissingField {
            field: field.into(),
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosisError::Validation(_) => "validation",
            DiagnosisError::MissingField { .. } => "missing_field",
            DiagnosisError::UnknownQuestion { .. } => "unknown_question",
            DiagnosisError::NotFound(_) => "not_found",
            DiagnosisError::NotReady(_) => "not_ready",
            DiagnosisError::RoundNotFound { .. } => "round_not_found",
            DiagnosisError::Unauthenticated(_) => "unauthenticated",
            DiagnosisError::Transaction(_) => "internal",
        }
    }

    /// Whether the caller can act on the error (as opposed to an internal failure)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DiagnosisError::Transaction(_))
    }

    /// Get a user-facing error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            DiagnosisError::Validation(msg) => format!("Invalid request: {}", msg),
            DiagnosisError::MissingField { field } => {
                format!("The required field '{}' is missing", field)
            }
            DiagnosisError::UnknownQuestion { battery, number } => {
                format!("Question {} does not exist in the {} battery", number, battery)
            }
            DiagnosisError::NotFound(msg) => format!("Nothing found: {}", msg),
            DiagnosisError::NotReady(msg) => {
                format!("The self-assessment cannot be completed yet: {}", msg)
            }
            DiagnosisError::RoundNotFound { round } => {
                format!("Diagnosis round {} has not been completed", round)
            }
            DiagnosisError::Unauthenticated(_) => "Please sign in to continue".to_string(),
            // Storage details stay in the log
            DiagnosisError::Transaction(_) => "Internal server error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for DiagnosisError {
    fn from(e: rusqlite::Error) -> Self {
        log::error!("[Store] storage failure: {}", e);
        DiagnosisError::Transaction(e.to_string())
    }
}

/// Top-level result type for engine operations.
pub type Result<T> = std::result::Result<T, DiagnosisError>;
