//! Typed request payloads.
//!
//! Fields arrive optional from the wire and are checked once by `validate()`,
//! which reports the first missing field by its wire name (with the entry
//! index for batch items). Everything past the boundary works on validated
//! values only.

use serde::{Deserialize, Serialize};

use crate::error::{DiagnosisError, Result};
use crate::models::{Battery, FeedbackItem, Intake, ResponseCategory, ResponseInput, SystemId};

/// Round used when a submission or query names none
pub const DEFAULT_ROUND: u32 = 1;

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| DiagnosisError::missing(field))
}

fn require_system_id(system_id: Option<i64>) -> Result<SystemId> {
    require(system_id, "systemId").map(SystemId)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterSystemRequest {
    pub name: Option<String>,
}

impl RegisterSystemRequest {
    pub fn validate(&self) -> Result<String> {
        let name = require(self.name.clone(), "name")?;
        if name.trim().is_empty() {
            return Err(DiagnosisError::missing("name"));
        }
        Ok(name)
    }
}

/// Requests addressing one system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemRequest {
    pub system_id: Option<i64>,
}

impl SystemRequest {
    pub fn new(system_id: SystemId) -> Self {
        SystemRequest {
            system_id: Some(system_id.0),
        }
    }

    pub fn validate(&self) -> Result<SystemId> {
        require_system_id(self.system_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveIntakeRequest {
    pub system_id: Option<i64>,
    pub organization: Option<String>,
    pub user_scale: Option<String>,
    pub personal_info_system: Option<bool>,
    pub member_info_homepage: Option<bool>,
    pub external_data_provision: Option<bool>,
    pub cctv_operation: Option<bool>,
    pub task_outsourcing: Option<bool>,
    pub personal_info_disposal: Option<bool>,
}

impl SaveIntakeRequest {
    /// Flags left out default to `false` ("none")
    pub fn validate(&self) -> Result<(SystemId, Intake)> {
        let system_id = require_system_id(self.system_id)?;
        let organization = require(self.organization.clone(), "organization")?;
        let user_scale = require(self.user_scale.clone(), "userScale")?;

        Ok((
            system_id,
            Intake {
                organization,
                user_scale,
                personal_info_system: self.personal_info_system.unwrap_or(false),
                member_info_homepage: self.member_info_homepage.unwrap_or(false),
                external_data_provision: self.external_data_provision.unwrap_or(false),
                cctv_operation: self.cctv_operation.unwrap_or(false),
                task_outsourcing: self.task_outsourcing.unwrap_or(false),
                personal_info_disposal: self.personal_info_disposal.unwrap_or(false),
            },
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseEntry {
    pub question_number: Option<u32>,
    pub category: Option<ResponseCategory>,
    pub comment: Option<String>,
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitResponsesRequest {
    pub system_id: Option<i64>,
    pub round: Option<u32>,
    pub responses: Vec<ResponseEntry>,
}

/// A submission that passed boundary validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub system_id: SystemId,
    pub round: u32,
    pub entries: Vec<ResponseInput>,
}

impl SubmitResponsesRequest {
    pub fn validate(&self) -> Result<ValidatedSubmission> {
        let system_id = require_system_id(self.system_id)?;
        let entries = self
            .responses
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                Ok(ResponseInput {
                    question_number: require(
                        entry.question_number,
                        &format!("responses[{}].questionNumber", i),
                    )?,
                    category: require(entry.category, &format!("responses[{}].category", i))?,
                    comment: entry.comment.clone(),
                    attachment: entry.attachment.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ValidatedSubmission {
            system_id,
            round: self.round.unwrap_or(DEFAULT_ROUND),
            entries,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoundRequest {
    pub system_id: Option<i64>,
    pub round: Option<u32>,
}

impl RoundRequest {
    pub fn validate(&self) -> Result<(SystemId, u32)> {
        Ok((require_system_id(self.system_id)?, require(self.round, "round")?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponsesQuery {
    pub system_id: Option<i64>,
    pub battery: Option<Battery>,
    /// Latest answered round when absent
    pub round: Option<u32>,
}

impl ResponsesQuery {
    pub fn validate(&self) -> Result<(SystemId, Battery, Option<u32>)> {
        Ok((
            require_system_id(self.system_id)?,
            require(self.battery, "battery")?,
            self.round,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackRequest {
    pub system_id: Option<i64>,
    pub battery: Option<Battery>,
    pub question_number: Option<u32>,
    pub content: Option<String>,
}

impl FeedbackRequest {
    pub fn validate(&self) -> Result<(SystemId, Battery, u32, String)> {
        Ok((
            require_system_id(self.system_id)?,
            require(self.battery, "battery")?,
            require(self.question_number, "questionNumber")?,
            require(self.content.clone(), "content")?,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackBatchRequest {
    pub system_id: Option<i64>,
    pub battery: Option<Battery>,
    pub items: Vec<FeedbackBatchEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackBatchEntry {
    pub question_number: Option<u32>,
    pub content: Option<String>,
}

impl FeedbackBatchRequest {
    /// Entries are not rejected here; the overlay skips and reports bad ones
    pub fn validate(&self) -> Result<(SystemId, Battery, Vec<FeedbackItem>)> {
        let items = self
            .items
            .iter()
            .map(|entry| FeedbackItem {
                question_number: entry.question_number,
                content: entry.content.clone().unwrap_or_default(),
            })
            .collect();
        Ok((
            require_system_id(self.system_id)?,
            require(self.battery, "battery")?,
            items,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFeedbackRequest {
    pub system_id: Option<i64>,
    pub question_number: Option<u32>,
}

impl ListFeedbackRequest {
    pub fn validate(&self) -> Result<(SystemId, Option<u32>)> {
        Ok((require_system_id(self.system_id)?, self.question_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_system_id_reported_by_wire_name() {
        let request = SystemRequest::default();
        assert_eq!(request.validate(), Err(DiagnosisError::missing("systemId")));
    }

    #[test]
    fn test_submission_reports_entry_index() {
        let request: SubmitResponsesRequest = serde_json::from_str(
            r#"{"systemId": 4, "responses": [
                {"questionNumber": 1, "category": "fulfilled"},
                {"questionNumber": 2, "category": "unfulfilled"},
                {"category": "consult_needed"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            request.validate(),
            Err(DiagnosisError::missing("responses[2].questionNumber"))
        );
    }

    #[test]
    fn test_submission_defaults_round() {
        let request: SubmitResponsesRequest = serde_json::from_str(
            r#"{"systemId": 4, "responses": [{"questionNumber": 1, "category": "not_applicable"}]}"#,
        )
        .unwrap();
        let submission = request.validate().unwrap();
        assert_eq!(submission.round, DEFAULT_ROUND);
        assert_eq!(submission.entries[0].category, ResponseCategory::NotApplicable);
    }

    #[test]
    fn test_intake_requires_organization_and_scale() {
        let mut request = SaveIntakeRequest {
            system_id: Some(1),
            organization: Some("Acme".to_string()),
            ..SaveIntakeRequest::default()
        };
        assert_eq!(request.validate(), Err(DiagnosisError::missing("userScale")));

        request.user_scale = Some("small".to_string());
        let (_, intake) = request.validate().unwrap();
        assert!(!intake.cctv_operation);
    }

    #[test]
    fn test_round_request_requires_round() {
        let request = RoundRequest {
            system_id: Some(1),
            round: None,
        };
        assert_eq!(request.validate(), Err(DiagnosisError::missing("round")));
    }
}
