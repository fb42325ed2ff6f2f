//! Round Lifecycle Manager
//!
//! Per (system, user) pair the diagnosis moves through numbered rounds:
//!
//! ```text
//! no rounds yet -> round N open -> round N committed -> round N+1 open -> ...
//! ```
//!
//! A round is open while answers are being submitted under its number and
//! becomes committed when `complete_round` writes its AssessmentResult. The
//! next round number is always `max(committed) + 1`, assigned inside the same
//! write-locked transaction that commits the result.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{DiagnosisError, Result};
use crate::ledger;
use crate::log_collector::AUDIT_TARGET;
use crate::models::{
    AnsweredQuestion, AssessmentResult, Battery, RoundResponses, RoundSummary, SystemId, UserId,
};
use crate::scoring::{self, parse_category, parse_grade, ScoreCard};
use crate::systems;

/// Lifecycle position of a (system, user) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RoundState {
    NoRoundsYet,
    /// Answers are being collected for `round`
    Open { round: u32 },
    /// `round` has a result and no answers exist for a later round yet
    Committed { round: u32 },
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::NoRoundsYet => "no_rounds_yet",
            RoundState::Open { .. } => "open",
            RoundState::Committed { .. } => "committed",
        }
    }
}

/// Highest committed round for a pair
pub fn latest_committed_round(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
) -> Result<Option<u32>> {
    Ok(conn.query_row(
        "SELECT MAX(round) FROM assessment_result WHERE system_id = ?1 AND user_id = ?2",
        params![system_id.0, user_id.0],
        |row| row.get(0),
    )?)
}

/// Round number the next completion will commit
pub fn next_round(conn: &Connection, system_id: SystemId, user_id: UserId) -> Result<u32> {
    systems::require_system(conn, system_id)?;
    Ok(latest_committed_round(conn, system_id, user_id)?.unwrap_or(0) + 1)
}

/// Derive the lifecycle state of a pair from committed results and stored answers
pub fn round_state(conn: &Connection, system_id: SystemId, user_id: UserId) -> Result<RoundState> {
    systems::require_system(conn, system_id)?;
    let committed = latest_committed_round(conn, system_id, user_id)?;
    let answered = [Battery::Quantitative, Battery::Qualitative]
        .iter()
        .map(|battery| ledger::latest_response_round(conn, *battery, system_id, user_id))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .max();

    Ok(match (committed, answered) {
        (None, None) => RoundState::NoRoundsYet,
        (None, Some(_)) => RoundState::Open { round: 1 },
        (Some(c), Some(a)) if a > c => RoundState::Open { round: c + 1 },
        (Some(c), _) => RoundState::Committed { round: c },
    })
}

/// Commit the next round of a (system, user) pair.
///
/// Must run inside a write transaction. `before_commit` sees the assigned
/// round and its score after scoring and before the result row is written;
/// returning an error aborts the completion.
pub fn complete_round<F>(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
    initial_feedback_status: &str,
    before_commit: F,
) -> Result<AssessmentResult>
where
    F: FnOnce(u32, &ScoreCard) -> Result<()>,
{
    systems::require_system(conn, system_id)?;
    let round = latest_committed_round(conn, system_id, user_id)?.unwrap_or(0) + 1;

    let intake = ledger::find_intake(conn, system_id, user_id)?.ok_or_else(|| {
        log::warn!(
            "[Rounds] completion refused: no intake for system {} user {}",
            system_id,
            user_id
        );
        DiagnosisError::NotReady(format!(
            "no self-assessment intake saved for system {}",
            system_id
        ))
    })?;

    let card = scoring::compute_score(conn, system_id, user_id, round)?;
    before_commit(round, &card)?;

    let completed_at = Utc::now();
    conn.execute(
        "INSERT INTO assessment_result
            (system_id, user_id, round, assessment_id, score, grade, feedback_status, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(system_id, user_id, round) DO UPDATE SET
            assessment_id = excluded.assessment_id,
            score = excluded.score,
            grade = excluded.grade,
            feedback_status = excluded.feedback_status,
            completed_at = excluded.completed_at",
        params![
            system_id.0,
            user_id.0,
            round,
            intake.id,
            card.score,
            card.grade.as_str(),
            initial_feedback_status,
            completed_at
        ],
    )?;

    if systems::mark_completed(conn, system_id)? {
        log::info!("[Rounds] system {} completed its first diagnosis", system_id);
    }

    log::info!(
        target: AUDIT_TARGET,
        "[Rounds] committed round {} for system {} user {}: score {} grade {}",
        round,
        system_id,
        user_id,
        card.score,
        card.grade
    );
    result_for_round(conn, system_id, user_id, round)
}

/// Committed rounds of a pair, newest first
pub fn list_rounds(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
) -> Result<Vec<RoundSummary>> {
    let mut stmt = conn.prepare(
        "SELECT ar.round, ar.completed_at, ar.score, ar.grade,
                (SELECT COUNT(DISTINCT qr.question_id) FROM quantitative_responses qr
                  WHERE qr.system_id = ar.system_id AND qr.user_id = ar.user_id
                    AND qr.round = ar.round)
         FROM assessment_result ar
         WHERE ar.system_id = ?1 AND ar.user_id = ?2
         ORDER BY ar.round DESC",
    )?;
    let rows = stmt
        .query_map(params![system_id.0, user_id.0], |row| {
            Ok(RoundSummary {
                round: row.get(0)?,
                completed_at: row.get(1)?,
                score: row.get(2)?,
                grade: parse_grade(row.get(3)?, 3)?,
                question_count: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

const RESULT_COLUMNS: &str =
    "id, system_id, user_id, round, assessment_id, score, grade, feedback_status, completed_at";

/// Full result of one explicit round
pub fn result_for_round(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
    round: u32,
) -> Result<AssessmentResult> {
    let sql = format!(
        "SELECT {} FROM assessment_result WHERE system_id = ?1 AND user_id = ?2 AND round = ?3",
        RESULT_COLUMNS
    );
    conn.query_row(&sql, params![system_id.0, user_id.0, round], map_result)
        .optional()?
        .ok_or(DiagnosisError::RoundNotFound { round })
}

/// Every committed result of a pair, most recently completed first
pub fn results_history(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
) -> Result<Vec<AssessmentResult>> {
    let sql = format!(
        "SELECT {} FROM assessment_result WHERE system_id = ?1 AND user_id = ?2
         ORDER BY completed_at DESC, round DESC",
        RESULT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![system_id.0, user_id.0], map_result)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if rows.is_empty() {
        return Err(DiagnosisError::NotFound(format!(
            "no diagnosis results for system {}",
            system_id
        )));
    }
    Ok(rows)
}

/// Most recently completed result of a system, whoever answered
pub fn latest_system_result(conn: &Connection, system_id: SystemId) -> Result<AssessmentResult> {
    let sql = format!(
        "SELECT {} FROM assessment_result WHERE system_id = ?1
         ORDER BY completed_at DESC, id DESC LIMIT 1",
        RESULT_COLUMNS
    );
    conn.query_row(&sql, params![system_id.0], map_result)
        .optional()?
        .ok_or_else(|| {
            DiagnosisError::NotFound(format!("no diagnosis results for system {}", system_id))
        })
}

/// A battery joined with the pair's answers for one round.
///
/// Without an explicit round the latest answered round of that battery is
/// used (1 when nothing was answered). Unanswered questions are kept with an
/// empty category.
pub fn responses_for_round(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    user_id: UserId,
    round: Option<u32>,
) -> Result<RoundResponses> {
    let round = match round {
        Some(round) => round,
        None => ledger::latest_response_round(conn, battery, system_id, user_id)?.unwrap_or(1),
    };

    let sql = match battery {
        Battery::Quantitative => {
            "SELECT qq.question_number, qq.question, NULL, c.name,
                    qr.category, qr.comment, qr.attachment
             FROM quantitative_questions qq
             LEFT JOIN quantitative_responses qr
               ON qq.id = qr.question_id AND qr.system_id = ?1
              AND qr.user_id = ?2 AND qr.round = ?3
             LEFT JOIN categories c ON qq.category_id = c.id
             ORDER BY qq.question_number"
        }
        Battery::Qualitative => {
            "SELECT qq.question_number, qq.indicator, qq.indicator_definition, NULL,
                    qr.category, qr.comment, qr.attachment
             FROM qualitative_questions qq
             LEFT JOIN qualitative_responses qr
               ON qq.id = qr.question_id AND qr.system_id = ?1
              AND qr.user_id = ?2 AND qr.round = ?3
             ORDER BY qq.question_number"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let responses = stmt
        .query_map(params![system_id.0, user_id.0, round], |row| {
            let category = match row.get::<_, Option<String>>(4)? {
                Some(raw) => Some(parse_category(raw, 4)?),
                None => None,
            };
            Ok(AnsweredQuestion {
                question_number: row.get(0)?,
                text: row.get(1)?,
                detail: row.get(2)?,
                category_name: row.get(3)?,
                category,
                comment: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                attachment: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(RoundResponses {
        battery,
        round,
        responses,
    })
}

fn map_result(row: &Row<'_>) -> rusqlite::Result<AssessmentResult> {
    Ok(AssessmentResult {
        id: row.get(0)?,
        system_id: SystemId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        round: row.get(3)?,
        assessment_id: row.get(4)?,
        score: row.get(5)?,
        grade: parse_grade(row.get(6)?, 6)?,
        feedback_status: row.get(7)?,
        completed_at: row.get(8)?,
    })
}
