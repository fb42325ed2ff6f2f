//! Core data types for the diagnosis engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::scoring::Grade;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Registered information asset under assessment.
    SystemId
);
id_type!(
    /// Organization member who answers the questionnaire.
    UserId
);
id_type!(
    /// Expert who reviews answers and leaves feedback.
    ExpertId
);

/// Question battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Battery {
    Quantitative,
    Qualitative,
}

impl Battery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Battery::Quantitative => "quantitative",
            Battery::Qualitative => "qualitative",
        }
    }

    pub(crate) fn questions_table(&self) -> &'static str {
        match self {
            Battery::Quantitative => "quantitative_questions",
            Battery::Qualitative => "qualitative_questions",
        }
    }

    pub(crate) fn responses_table(&self) -> &'static str {
        match self {
            Battery::Quantitative => "quantitative_responses",
            Battery::Qualitative => "qualitative_responses",
        }
    }

    /// Category written when an expert annotates a question nobody answered yet.
    ///
    /// Placeholders are stored under the expert's own id, so they never count
    /// toward any user's round score.
    pub fn placeholder_category(&self) -> ResponseCategory {
        match self {
            Battery::Quantitative => ResponseCategory::Fulfilled,
            Battery::Qualitative => ResponseCategory::NotApplicable,
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerated answer to a question.
///
/// Both batteries share the enum; the qualitative battery only awards points
/// for `ConsultNeeded` and `NotApplicable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    Fulfilled,
    Unfulfilled,
    ConsultNeeded,
    NotApplicable,
}

impl ResponseCategory {
    pub const ALL: [ResponseCategory; 4] = [
        ResponseCategory::Fulfilled,
        ResponseCategory::Unfulfilled,
        ResponseCategory::ConsultNeeded,
        ResponseCategory::NotApplicable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCategory::Fulfilled => "fulfilled",
            ResponseCategory::Unfulfilled => "unfulfilled",
            ResponseCategory::ConsultNeeded => "consult_needed",
            ResponseCategory::NotApplicable => "not_applicable",
        }
    }

    /// Only consult requests carry a free-text comment
    pub fn keeps_comment(&self) -> bool {
        matches!(self, ResponseCategory::ConsultNeeded)
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCategory::Fulfilled => write!(f, "Fulfilled"),
            ResponseCategory::Unfulfilled => write!(f, "Unfulfilled"),
            ResponseCategory::ConsultNeeded => write!(f, "Consult needed"),
            ResponseCategory::NotApplicable => write!(f, "Not applicable"),
        }
    }
}

impl FromStr for ResponseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fulfilled" => Ok(ResponseCategory::Fulfilled),
            "unfulfilled" => Ok(ResponseCategory::Unfulfilled),
            "consult_needed" => Ok(ResponseCategory::ConsultNeeded),
            "not_applicable" => Ok(ResponseCategory::NotApplicable),
            _ => Err(format!("Unknown response category: {}", s)),
        }
    }
}

/// Point values of a quantitative question, one per response category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantitativePoints {
    pub fulfilled: f64,
    pub unfulfilled: f64,
    pub consult: f64,
    pub not_applicable: f64,
}

impl QuantitativePoints {
    pub fn points_for(&self, category: ResponseCategory) -> f64 {
        match category {
            ResponseCategory::Fulfilled => self.fulfilled,
            ResponseCategory::Unfulfilled => self.unfulfilled,
            ResponseCategory::ConsultNeeded => self.consult,
            ResponseCategory::NotApplicable => self.not_applicable,
        }
    }

    /// Best achievable points for the question
    pub fn maximum(&self) -> f64 {
        self.fulfilled
    }
}

/// Point values of a qualitative question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitativePoints {
    pub consult: f64,
    pub not_applicable: f64,
}

impl QualitativePoints {
    pub fn points_for(&self, category: ResponseCategory) -> f64 {
        match category {
            ResponseCategory::ConsultNeeded => self.consult,
            ResponseCategory::NotApplicable => self.not_applicable,
            ResponseCategory::Fulfilled | ResponseCategory::Unfulfilled => 0.0,
        }
    }
}

/// Lifecycle status of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    NotStarted,
    /// Never stored; derived when responses exist before the first completion
    InProgress,
    Completed,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::NotStarted => "not_started",
            SystemStatus::InProgress => "in_progress",
            SystemStatus::Completed => "completed",
        }
    }
}

impl FromStr for SystemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(SystemStatus::NotStarted),
            "in_progress" => Ok(SystemStatus::InProgress),
            "completed" => Ok(SystemStatus::Completed),
            _ => Err(format!("Unknown system status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub owner: UserId,
    pub name: String,
    pub status: SystemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeQuestion {
    pub id: i64,
    pub question_number: u32,
    pub category_id: Option<i64>,
    pub question: String,
    pub points: QuantitativePoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeQuestion {
    pub id: i64,
    pub question_number: u32,
    pub indicator: String,
    pub indicator_definition: Option<String>,
    pub points: QualitativePoints,
}

/// Self-assessment preamble that gates round completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfAssessment {
    pub id: i64,
    pub system_id: SystemId,
    pub user_id: UserId,
    pub intake: Intake,
}

/// Organization profile captured before answering the batteries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intake {
    pub organization: String,
    pub user_scale: String,
    pub personal_info_system: bool,
    pub member_info_homepage: bool,
    pub external_data_provision: bool,
    pub cctv_operation: bool,
    pub task_outsourcing: bool,
    pub personal_info_disposal: bool,
}

/// One validated answer in a submission batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInput {
    pub question_number: u32,
    pub category: ResponseCategory,
    pub comment: Option<String>,
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub id: i64,
    pub battery: Battery,
    pub system_id: SystemId,
    pub user_id: UserId,
    pub question_id: i64,
    pub round: u32,
    pub category: ResponseCategory,
    pub comment: Option<String>,
    pub attachment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A catalog question joined with the caller's answer for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_number: u32,
    /// Question text, or the indicator for qualitative questions
    pub text: String,
    pub detail: Option<String>,
    pub category_name: Option<String>,
    /// `None` when the question has not been answered in the round
    pub category: Option<ResponseCategory>,
    pub comment: String,
    pub attachment: String,
}

impl AnsweredQuestion {
    /// Category label with `-` standing in for unanswered questions
    pub fn display_category(&self) -> &'static str {
        self.category.map(|c| c.as_str()).unwrap_or("-")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResponses {
    pub battery: Battery,
    pub round: u32,
    pub responses: Vec<AnsweredQuestion>,
}

/// Committed outcome of one diagnosis round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub id: i64,
    pub system_id: SystemId,
    pub user_id: UserId,
    pub round: u32,
    pub assessment_id: i64,
    pub score: f64,
    pub grade: Grade,
    pub feedback_status: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub completed_at: DateTime<Utc>,
    pub score: f64,
    pub grade: Grade,
    /// Distinct quantitative questions answered in the round
    pub question_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGap {
    pub category_id: i64,
    pub category: String,
    pub achieved: f64,
    pub maximum: f64,
    /// `None` when the category cannot score any points
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparison {
    pub has_diagnosis: bool,
    pub round: Option<u32>,
    pub data: Option<Vec<CategoryGap>>,
}

impl CategoryComparison {
    pub fn no_diagnosis() -> Self {
        CategoryComparison {
            has_diagnosis: false,
            round: None,
            data: None,
        }
    }
}

/// The single response a feedback row annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "battery", content = "response_id", rename_all = "snake_case")]
pub enum FeedbackTarget {
    Quantitative(i64),
    Qualitative(i64),
}

impl FeedbackTarget {
    pub fn new(battery: Battery, response_id: i64) -> Self {
        match battery {
            Battery::Quantitative => FeedbackTarget::Quantitative(response_id),
            Battery::Qualitative => FeedbackTarget::Qualitative(response_id),
        }
    }

    pub fn battery(&self) -> Battery {
        match self {
            FeedbackTarget::Quantitative(_) => Battery::Quantitative,
            FeedbackTarget::Qualitative(_) => Battery::Qualitative,
        }
    }

    pub fn response_id(&self) -> i64 {
        match self {
            FeedbackTarget::Quantitative(id) | FeedbackTarget::Qualitative(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub system_id: SystemId,
    /// Owner of the annotated response
    pub user_id: UserId,
    pub expert_id: ExpertId,
    pub assessment_result_id: Option<i64>,
    pub target: FeedbackTarget,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Feedback joined with the question it annotates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: i64,
    pub battery: Battery,
    pub question_number: u32,
    pub expert_id: ExpertId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Acknowledgement for a stored response batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub battery: Battery,
    pub round: u32,
    pub stored: usize,
}

/// One expert comment in a feedback batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub question_number: Option<u32>,
    pub content: String,
}

/// Batch entry that was not attached, by position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFeedback {
    pub index: usize,
    pub question_number: Option<u32>,
    pub reason: String,
}

/// Acknowledgement for a feedback batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackAck {
    pub attached: Vec<Feedback>,
    pub skipped: Vec<SkippedFeedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in ResponseCategory::ALL {
            assert_eq!(category.as_str().parse::<ResponseCategory>(), Ok(category));
        }
        assert!("partially".parse::<ResponseCategory>().is_err());
    }

    #[test]
    fn test_quantitative_points_cover_every_category() {
        let points = QuantitativePoints {
            fulfilled: 10.0,
            unfulfilled: 0.0,
            consult: 3.0,
            not_applicable: 1.0,
        };
        assert_eq!(points.points_for(ResponseCategory::Fulfilled), 10.0);
        assert_eq!(points.points_for(ResponseCategory::Unfulfilled), 0.0);
        assert_eq!(points.points_for(ResponseCategory::ConsultNeeded), 3.0);
        assert_eq!(points.points_for(ResponseCategory::NotApplicable), 1.0);
        assert_eq!(points.maximum(), 10.0);
    }

    #[test]
    fn test_qualitative_points_ignore_fulfillment_answers() {
        let points = QualitativePoints {
            consult: 2.0,
            not_applicable: 5.0,
        };
        assert_eq!(points.points_for(ResponseCategory::Fulfilled), 0.0);
        assert_eq!(points.points_for(ResponseCategory::Unfulfilled), 0.0);
        assert_eq!(points.points_for(ResponseCategory::ConsultNeeded), 2.0);
        assert_eq!(points.points_for(ResponseCategory::NotApplicable), 5.0);
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&ResponseCategory::ConsultNeeded).unwrap();
        assert_eq!(json, "\"consult_needed\"");
    }

    #[test]
    fn test_feedback_target_is_tagged() {
        let target = FeedbackTarget::new(Battery::Qualitative, 7);
        let json = serde_json::to_value(target).unwrap();
        assert_eq!(json["battery"], "qualitative");
        assert_eq!(json["response_id"], 7);
        assert_eq!(target.battery(), Battery::Qualitative);
    }

    #[test]
    fn test_unanswered_question_displays_placeholder() {
        let row = AnsweredQuestion {
            question_number: 1,
            text: "Is there a privacy officer?".to_string(),
            detail: None,
            category_name: None,
            category: None,
            comment: String::new(),
            attachment: String::new(),
        };
        assert_eq!(row.display_category(), "-");
    }
}
