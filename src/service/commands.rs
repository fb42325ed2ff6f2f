//! JSON-lines command protocol.
//!
//! One command per line:
//!
//! ```text
//! {"op": "submit_quantitative", "actor": {"role": "user", "id": 7},
//!  "systemId": 3, "round": 1, "responses": [{"questionNumber": 1, "category": "fulfilled"}]}
//! ```
//!
//! One reply per line: `{"ok": true, "data": ...}` or
//! `{"ok": false, "error": {"kind": "...", "message": "..."}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::requests::{
    FeedbackBatchRequest, FeedbackRequest, ListFeedbackRequest, RegisterSystemRequest,
    ResponsesQuery, RoundRequest, SaveIntakeRequest, SubmitResponsesRequest, SystemRequest,
};
use super::{Actor, DiagnosisService};
use crate::error::{DiagnosisError, Result};
use crate::models::Battery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    RegisterSystem(RegisterSystemRequest),
    GetSystem(SystemRequest),
    Catalog,
    SaveIntake(SaveIntakeRequest),
    SubmitQuantitative(SubmitResponsesRequest),
    SubmitQualitative(SubmitResponsesRequest),
    NextRound(SystemRequest),
    CompleteRound(SystemRequest),
    ListRounds(SystemRequest),
    ResultForRound(RoundRequest),
    ResultsHistory(SystemRequest),
    ResponsesForRound(ResponsesQuery),
    CompareCategories(SystemRequest),
    AttachFeedback(FeedbackRequest),
    AttachFeedbackBatch(FeedbackBatchRequest),
    ListFeedback(ListFeedbackRequest),
    MarkFeedbackApplied(SystemRequest),
    AssessmentStatuses,
    SystemSummary(SystemRequest),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterSystem(_) => "register_system",
            Command::GetSystem(_) => "get_system",
            Command::Catalog => "catalog",
            Command::SaveIntake(_) => "save_intake",
            Command::SubmitQuantitative(_) => "submit_quantitative",
            Command::SubmitQualitative(_) => "submit_qualitative",
            Command::NextRound(_) => "next_round",
            Command::CompleteRound(_) => "complete_round",
            Command::ListRounds(_) => "list_rounds",
            Command::ResultForRound(_) => "result_for_round",
            Command::ResultsHistory(_) => "results_history",
            Command::ResponsesForRound(_) => "responses_for_round",
            Command::CompareCategories(_) => "compare_categories",
            Command::AttachFeedback(_) => "attach_feedback",
            Command::AttachFeedbackBatch(_) => "attach_feedback_batch",
            Command::ListFeedback(_) => "list_feedback",
            Command::MarkFeedbackApplied(_) => "mark_feedback_applied",
            Command::AssessmentStatuses => "assessment_statuses",
            Command::SystemSummary(_) => "system_summary",
        }
    }
}

/// A command together with the identity that issued it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub actor: Actor,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    pub fn success(data: Value) -> Self {
        Reply {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn from_error(error: &DiagnosisError) -> Self {
        Reply {
            ok: false,
            data: None,
            error: Some(ErrorBody {
                kind: error.kind().to_string(),
                message: error.user_message(),
            }),
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("[Commands] failed to encode reply: {}", e);
            r#"{"ok":false,"error":{"kind":"internal","message":"Internal server error"}}"#
                .to_string()
        })
    }
}

fn to_data<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| DiagnosisError::Transaction(format!("failed to encode reply: {}", e)))
}

/// Run one command against the service
pub fn dispatch(service: &DiagnosisService, envelope: &Envelope) -> Result<Value> {
    let actor = &envelope.actor;
    match &envelope.command {
        Command::RegisterSystem(req) => to_data(service.register_system(actor, req)?),
        Command::GetSystem(req) => to_data(service.get_system(actor, req)?),
        Command::Catalog => to_data(service.catalog(actor)?),
        Command::SaveIntake(req) => to_data(service.save_intake(actor, req)?),
        Command::SubmitQuantitative(req) => {
            to_data(service.submit_responses(actor, Battery::Quantitative, req)?)
        }
        Command::SubmitQualitative(req) => {
            to_data(service.submit_responses(actor, Battery::Qualitative, req)?)
        }
        Command::NextRound(req) => to_data(service.next_round(actor, req)?),
        Command::CompleteRound(req) => to_data(service.complete_round(actor, req)?),
        Command::ListRounds(req) => to_data(service.list_rounds(actor, req)?),
        Command::ResultForRound(req) => to_data(service.result_for_round(actor, req)?),
        Command::ResultsHistory(req) => to_data(service.results_history(actor, req)?),
        Command::ResponsesForRound(req) => to_data(service.responses_for_round(actor, req)?),
        Command::CompareCategories(req) => to_data(service.compare_categories(actor, req)?),
        Command::AttachFeedback(req) => to_data(service.attach_feedback(actor, req)?),
        Command::AttachFeedbackBatch(req) => to_data(service.attach_feedback_batch(actor, req)?),
        Command::ListFeedback(req) => to_data(service.list_feedback(actor, req)?),
        Command::MarkFeedbackApplied(req) => to_data(service.mark_feedback_applied(actor, req)?),
        Command::AssessmentStatuses => to_data(service.assessment_statuses(actor)?),
        Command::SystemSummary(req) => to_data(service.system_summary(actor, req)?),
    }
}

/// Parse one input line, run it, and encode the reply line
pub fn handle_line(service: &DiagnosisService, line: &str) -> String {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!("[Commands] unreadable command: {}", e);
            let error = DiagnosisError::Validation(format!("unreadable command: {}", e));
            return Reply::from_error(&error).to_line();
        }
    };

    let reply = match dispatch(service, &envelope) {
        Ok(data) => Reply::success(data),
        Err(e) => {
            if e.is_recoverable() {
                log::info!("[Commands] {} rejected: {}", envelope.command.name(), e);
            } else {
                log::error!("[Commands] {} failed: {}", envelope.command.name(), e);
            }
            Reply::from_error(&e)
        }
    };
    reply.to_line()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::Store;
    use std::sync::Arc;

    fn service() -> DiagnosisService {
        DiagnosisService::new(Arc::new(Store::in_memory().unwrap()), EngineConfig::default())
    }

    #[test]
    fn test_envelope_parses_flat_line() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"op": "next_round", "actor": {"role": "user", "id": 2}, "systemId": 5}"#,
        )
        .unwrap();
        assert_eq!(envelope.actor, Actor::User(crate::models::UserId(2)));
        assert_eq!(
            envelope.command,
            Command::NextRound(SystemRequest { system_id: Some(5) })
        );
    }

    #[test]
    fn test_unit_command_parses() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"op": "assessment_statuses", "actor": {"role": "expert", "id": 1}}"#)
                .unwrap();
        assert_eq!(envelope.command, Command::AssessmentStatuses);
    }

    #[test]
    fn test_garbage_line_yields_validation_reply() {
        let reply: Reply = serde_json::from_str(&handle_line(&service(), "not json")).unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.error.unwrap().kind, "validation");
    }

    #[test]
    fn test_missing_actor_is_unauthenticated() {
        let line = r#"{"op": "next_round", "systemId": 1}"#;
        let reply: Reply = serde_json::from_str(&handle_line(&service(), line)).unwrap();
        assert_eq!(reply.error.unwrap().kind, "unauthenticated");
    }

    #[test]
    fn test_register_then_next_round() {
        let service = service();
        let line = r#"{"op": "register_system", "actor": {"role": "user", "id": 1}, "name": "CRM"}"#;
        let reply: Reply = serde_json::from_str(&handle_line(&service, line)).unwrap();
        assert!(reply.ok);
        let system_id = reply.data.unwrap()["id"].as_i64().unwrap();

        let line = format!(
            r#"{{"op": "next_round", "actor": {{"role": "user", "id": 1}}, "systemId": {}}}"#,
            system_id
        );
        let reply: Reply = serde_json::from_str(&handle_line(&service, &line)).unwrap();
        assert_eq!(reply.data, Some(serde_json::json!(1)));
    }
}
