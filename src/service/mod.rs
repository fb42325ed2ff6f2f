//! Operation surface of the engine.
//!
//! `DiagnosisService` checks the caller's identity, validates the typed
//! request and runs the component functions against the shared store, one
//! transaction per operation. `AsyncDiagnosisService` moves the same calls
//! onto tokio's blocking pool so request handlers never block a runtime
//! worker on SQLite.
//!
//! - `requests`: wire payloads and their boundary validation
//! - `commands`: JSON-lines command protocol used by the binary

pub mod commands;
pub mod requests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{self, CatalogSeed, ImportSummary};
use crate::config::EngineConfig;
use crate::error::{DiagnosisError, Result};
use crate::feedback;
use crate::gap;
use crate::ledger;
use crate::models::{
    AssessmentResult, Battery, Category, CategoryComparison, ExpertId, Feedback, FeedbackAck,
    FeedbackEntry, QualitativeQuestion, QuantitativeQuestion, RoundResponses, RoundSummary,
    SelfAssessment, SubmitAck, System, SystemId, UserId,
};
use crate::rounds;
use crate::scoring::ScoreCard;
use crate::store::Store;
use crate::systems;

use requests::{
    FeedbackBatchRequest, FeedbackRequest, ListFeedbackRequest, RegisterSystemRequest,
    ResponsesQuery, RoundRequest, SaveIntakeRequest, SubmitResponsesRequest, SystemRequest,
};

/// Authenticated identity supplied by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    #[default]
    Anonymous,
    User(UserId),
    Expert(ExpertId),
}

impl Actor {
    /// The answering user, or `Unauthenticated`
    pub fn user(&self) -> Result<UserId> {
        match self {
            Actor::User(id) => Ok(*id),
            Actor::Expert(_) => Err(DiagnosisError::Unauthenticated(
                "operation requires a user session".to_string(),
            )),
            Actor::Anonymous => Err(DiagnosisError::Unauthenticated(
                "no session".to_string(),
            )),
        }
    }

    /// The reviewing expert, or `Unauthenticated`
    pub fn expert(&self) -> Result<ExpertId> {
        match self {
            Actor::Expert(id) => Ok(*id),
            Actor::User(_) => Err(DiagnosisError::Unauthenticated(
                "operation requires an expert session".to_string(),
            )),
            Actor::Anonymous => Err(DiagnosisError::Unauthenticated(
                "no session".to_string(),
            )),
        }
    }

    /// Any signed-in actor
    pub fn require_authenticated(&self) -> Result<()> {
        match self {
            Actor::Anonymous => Err(DiagnosisError::Unauthenticated(
                "no session".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Both batteries and their categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogView {
    pub categories: Vec<Category>,
    pub quantitative: Vec<QuantitativeQuestion>,
    pub qualitative: Vec<QualitativeQuestion>,
}

/// A system with its most recent committed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub system: System,
    pub latest_result: AssessmentResult,
}

/// Synchronous engine facade over one shared store
pub struct DiagnosisService {
    store: Arc<Store>,
    config: EngineConfig,
}

impl DiagnosisService {
    pub fn new(store: Arc<Store>, config: EngineConfig) -> Self {
        DiagnosisService { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Catalog and systems
    // ------------------------------------------------------------------

    pub fn import_catalog(&self, seed: &CatalogSeed) -> Result<ImportSummary> {
        catalog::validate_seed(seed).map_err(|e| DiagnosisError::Validation(e.to_string()))?;
        self.store.write(|conn| catalog::import_catalog(conn, seed))
    }

    pub fn catalog(&self, actor: &Actor) -> Result<CatalogView> {
        actor.require_authenticated()?;
        self.store.read(|conn| {
            Ok(CatalogView {
                categories: catalog::list_categories(conn)?,
                quantitative: catalog::list_quantitative(conn)?,
                qualitative: catalog::list_qualitative(conn)?,
            })
        })
    }

    pub fn register_system(&self, actor: &Actor, request: &RegisterSystemRequest) -> Result<System> {
        let owner = actor.user()?;
        let name = request.validate()?;
        self.store
            .write(|conn| systems::register_system(conn, owner, &name))
    }

    pub fn get_system(&self, actor: &Actor, request: &SystemRequest) -> Result<System> {
        actor.require_authenticated()?;
        let system_id = request.validate()?;
        self.store.read(|conn| systems::get_system(conn, system_id))
    }

    pub fn assessment_statuses(&self, actor: &Actor) -> Result<BTreeMap<SystemId, bool>> {
        actor.require_authenticated()?;
        self.store.read(systems::assessment_statuses)
    }

    pub fn system_summary(&self, actor: &Actor, request: &SystemRequest) -> Result<SystemSummary> {
        actor.require_authenticated()?;
        let system_id = request.validate()?;
        self.store.read(|conn| {
            Ok(SystemSummary {
                system: systems::get_system(conn, system_id)?,
                latest_result: rounds::latest_system_result(conn, system_id)?,
            })
        })
    }

    // ------------------------------------------------------------------
    // Response ledger
    // ------------------------------------------------------------------

    pub fn save_intake(&self, actor: &Actor, request: &SaveIntakeRequest) -> Result<SelfAssessment> {
        let user_id = actor.user()?;
        let (system_id, intake) = request.validate()?;
        self.store
            .write(|conn| ledger::save_intake(conn, system_id, user_id, &intake))
    }

    pub fn submit_responses(
        &self,
        actor: &Actor,
        battery: Battery,
        request: &SubmitResponsesRequest,
    ) -> Result<SubmitAck> {
        let user_id = actor.user()?;
        let submission = request.validate()?;
        self.store.write(|conn| {
            ledger::submit_responses(
                conn,
                battery,
                submission.system_id,
                user_id,
                submission.round,
                &submission.entries,
            )
        })
    }

    // ------------------------------------------------------------------
    // Round lifecycle
    // ------------------------------------------------------------------

    pub fn next_round(&self, actor: &Actor, request: &SystemRequest) -> Result<u32> {
        let user_id = actor.user()?;
        let system_id = request.validate()?;
        self.store
            .read(|conn| rounds::next_round(conn, system_id, user_id))
    }

    pub fn complete_round(&self, actor: &Actor, request: &SystemRequest) -> Result<AssessmentResult> {
        self.complete_round_with(actor, request, |_, _| Ok(()))
    }

    /// Complete a round, running `before_commit` between scoring and the result insert.
    ///
    /// An error from the hook rolls the whole completion back.
    pub fn complete_round_with<F>(
        &self,
        actor: &Actor,
        request: &SystemRequest,
        before_commit: F,
    ) -> Result<AssessmentResult>
    where
        F: FnOnce(u32, &ScoreCard) -> Result<()>,
    {
        let user_id = actor.user()?;
        let system_id = request.validate()?;
        let label = self.config.initial_feedback_status.as_str();
        self.store.write(|conn| {
            rounds::complete_round(conn, system_id, user_id, label, before_commit)
        })
    }

    pub fn list_rounds(&self, actor: &Actor, request: &SystemRequest) -> Result<Vec<RoundSummary>> {
        let user_id = actor.user()?;
        let system_id = request.validate()?;
        self.store
            .read(|conn| rounds::list_rounds(conn, system_id, user_id))
    }

    pub fn result_for_round(&self, actor: &Actor, request: &RoundRequest) -> Result<AssessmentResult> {
        let user_id = actor.user()?;
        let (system_id, round) = request.validate()?;
        self.store
            .read(|conn| rounds::result_for_round(conn, system_id, user_id, round))
    }

    pub fn results_history(
        &self,
        actor: &Actor,
        request: &SystemRequest,
    ) -> Result<Vec<AssessmentResult>> {
        let user_id = actor.user()?;
        let system_id = request.validate()?;
        self.store
            .read(|conn| rounds::results_history(conn, system_id, user_id))
    }

    pub fn responses_for_round(
        &self,
        actor: &Actor,
        request: &ResponsesQuery,
    ) -> Result<RoundResponses> {
        let user_id = actor.user()?;
        let (system_id, battery, round) = request.validate()?;
        self.store.read(|conn| {
            systems::require_system(conn, system_id)?;
            rounds::responses_for_round(conn, battery, system_id, user_id, round)
        })
    }

    // ------------------------------------------------------------------
    // Gap analysis
    // ------------------------------------------------------------------

    pub fn compare_categories(
        &self,
        actor: &Actor,
        request: &SystemRequest,
    ) -> Result<CategoryComparison> {
        let user_id = actor.user()?;
        let system_id = request.validate()?;
        self.store.read(|conn| {
            systems::require_system(conn, system_id)?;
            gap::compare_categories(conn, system_id, user_id)
        })
    }

    // ------------------------------------------------------------------
    // Feedback overlay
    // ------------------------------------------------------------------

    pub fn attach_feedback(&self, actor: &Actor, request: &FeedbackRequest) -> Result<Feedback> {
        let expert_id = actor.expert()?;
        let (system_id, battery, question_number, content) = request.validate()?;
        self.store.write(|conn| {
            feedback::attach_feedback(conn, system_id, expert_id, battery, question_number, &content)
        })
    }

    pub fn attach_feedback_batch(
        &self,
        actor: &Actor,
        request: &FeedbackBatchRequest,
    ) -> Result<FeedbackAck> {
        let expert_id = actor.expert()?;
        let (system_id, battery, items) = request.validate()?;
        self.store.write(|conn| {
            feedback::attach_feedback_batch(conn, system_id, expert_id, battery, &items)
        })
    }

    pub fn mark_feedback_applied(&self, actor: &Actor, request: &SystemRequest) -> Result<usize> {
        actor.expert()?;
        let system_id = request.validate()?;
        let label = self.config.applied_feedback_status.as_str();
        self.store
            .write(|conn| feedback::mark_feedback_applied(conn, system_id, label))
    }

    pub fn list_feedback(
        &self,
        actor: &Actor,
        request: &ListFeedbackRequest,
    ) -> Result<Vec<FeedbackEntry>> {
        actor.require_authenticated()?;
        let (system_id, question_number) = request.validate()?;
        self.store.read(|conn| {
            systems::require_system(conn, system_id)?;
            feedback::list_feedback(conn, system_id, question_number)
        })
    }
}

/// Async facade: every call runs on the blocking pool
#[derive(Clone)]
pub struct AsyncDiagnosisService {
    inner: Arc<DiagnosisService>,
}

impl AsyncDiagnosisService {
    pub fn new(inner: DiagnosisService) -> Self {
        AsyncDiagnosisService {
            inner: Arc::new(inner),
        }
    }

    pub fn inner(&self) -> &Arc<DiagnosisService> {
        &self.inner
    }

    /// Run any synchronous operation on the blocking pool
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DiagnosisService) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|e| {
                log::error!("[Service] blocking task failed: {}", e);
                DiagnosisError::Transaction(format!("blocking task failed: {}", e))
            })?
    }

    pub async fn submit_responses(
        &self,
        actor: Actor,
        battery: Battery,
        request: SubmitResponsesRequest,
    ) -> Result<SubmitAck> {
        self.run(move |service| service.submit_responses(&actor, battery, &request))
            .await
    }

    pub async fn complete_round(
        &self,
        actor: Actor,
        request: SystemRequest,
    ) -> Result<AssessmentResult> {
        self.run(move |service| service.complete_round(&actor, &request))
            .await
    }

    pub async fn compare_categories(
        &self,
        actor: Actor,
        request: SystemRequest,
    ) -> Result<CategoryComparison> {
        self.run(move |service| service.compare_categories(&actor, &request))
            .await
    }

    pub async fn handle_line(&self, line: String) -> String {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || commands::handle_line(&inner, &line)).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("[Service] command task failed: {}", e);
                commands::Reply::from_error(&DiagnosisError::Transaction(e.to_string())).to_line()
            }
        }
    }
}
