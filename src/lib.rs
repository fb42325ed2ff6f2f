//! Privacy Self-Assessment Diagnosis Engine
//!
//! Organizations self-assess personal-information-protection compliance for
//! a registered system by answering a quantitative and a qualitative question
//! battery. The engine scores each round, grades it, tracks repeated rounds
//! and overlays expert feedback without touching committed scores.
//!
//! The crate is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Core data structures and types
//! - **config**: Engine configuration loading and validation
//! - **log_collector**: Background disk logging behind the `log` facade
//! - **store**: SQLite store, schema and transactions
//! - **catalog**: Question catalog import and lookup
//! - **systems**: Systems under assessment and their status
//! - **ledger**: Response ledger and intake records
//! - **scoring**: Compliance scoring and grading
//! - **rounds**: Round lifecycle (numbering, completion, history)
//! - **gap**: Category gap analysis
//! - **feedback**: Expert feedback overlay
//! - **service**: Actor-checked operation surface, async facade and command protocol

#![allow(dead_code)]

// Core foundational modules
pub mod error;
pub mod models;

pub mod config;

// Robust, decoupled logging system
pub mod log_collector;

// Persistence
pub mod store;

// Engine components, leaves first
pub mod catalog;
pub mod systems;
pub mod ledger;
pub mod scoring;
pub mod rounds;
pub mod gap;
pub mod feedback;

pub mod service;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{ConfigError, DiagnosisError, Result};

pub use models::{
    AnsweredQuestion, AssessmentResult, Battery, CategoryComparison, CategoryGap, ExpertId,
    Feedback, FeedbackAck, FeedbackEntry, FeedbackItem, FeedbackTarget, Intake, ResponseCategory,
    ResponseInput, RoundResponses, RoundSummary, SubmitAck, System, SystemId, SystemStatus,
    UserId,
};

pub use config::EngineConfig;
pub use scoring::{ComplianceScorer, Grade, ScoreCard};
pub use store::Store;
pub use service::{Actor, AsyncDiagnosisService, DiagnosisService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
