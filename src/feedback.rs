//! Feedback Overlay
//!
//! Experts annotate individual answers. Feedback rows reference the answer
//! they annotate and, when the answer's round has been committed, that
//! round's result. The overlay only ever rewrites the feedback-status label
//! of a result; scores and grades are left as committed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::catalog;
use crate::error::{DiagnosisError, Result};
use crate::ledger;
use crate::log_collector::AUDIT_TARGET;
use crate::models::{
    Battery, ExpertId, Feedback, FeedbackAck, FeedbackEntry, FeedbackItem, FeedbackTarget,
    SkippedFeedback, StoredResponse, SystemId, UserId,
};
use crate::systems;

/// Attach one expert comment to the most recent answer of a question.
///
/// When nobody answered the question yet, a placeholder answer attributed
/// to the expert is written first so the comment has something to point at.
pub fn attach_feedback(
    conn: &Connection,
    system_id: SystemId,
    expert_id: ExpertId,
    battery: Battery,
    question_number: u32,
    content: &str,
) -> Result<Feedback> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DiagnosisError::missing("content"));
    }
    systems::require_system(conn, system_id)?;

    let question_id = catalog::find_question_id(conn, battery, question_number)?.ok_or(
        DiagnosisError::UnknownQuestion {
            battery: battery.as_str().to_string(),
            number: question_number,
        },
    )?;

    let now = Utc::now();
    let response = resolve_response(conn, battery, system_id, expert_id, question_id, now)?;
    insert_feedback(conn, &response, expert_id, content, now)
}

/// Attach several comments for one battery.
///
/// Entries without a question number, with blank content or naming an
/// unknown question are skipped and reported back; the rest are attached.
pub fn attach_feedback_batch(
    conn: &Connection,
    system_id: SystemId,
    expert_id: ExpertId,
    battery: Battery,
    items: &[FeedbackItem],
) -> Result<FeedbackAck> {
    systems::require_system(conn, system_id)?;

    let mut ack = FeedbackAck::default();
    let now = Utc::now();

    for (index, item) in items.iter().enumerate() {
        let content = item.content.trim();
        let skip = |reason: &str| {
            log::warn!(
                "[Feedback] skipping batch entry {} ({:?}) for system {}: {}",
                index,
                item.question_number,
                system_id,
                reason
            );
            SkippedFeedback {
                index,
                question_number: item.question_number,
                reason: reason.to_string(),
            }
        };

        let number = match item.question_number {
            Some(number) => number,
            None => {
                ack.skipped.push(skip("missing question number"));
                continue;
            }
        };
        if content.is_empty() {
            ack.skipped.push(skip("blank content"));
            continue;
        }
        let question_id = match catalog::find_question_id(conn, battery, number)? {
            Some(id) => id,
            None => {
                ack.skipped.push(skip("unknown question"));
                continue;
            }
        };

        let response = resolve_response(conn, battery, system_id, expert_id, question_id, now)?;
        ack.attached
            .push(insert_feedback(conn, &response, expert_id, content, now)?);
    }

    log::info!(
        "[Feedback] expert {} attached {} {} comments to system {} ({} skipped)",
        expert_id,
        ack.attached.len(),
        battery,
        system_id,
        ack.skipped.len()
    );
    Ok(ack)
}

/// Relabel every result of a system as feedback-incorporated.
///
/// Returns the number of results updated.
pub fn mark_feedback_applied(conn: &Connection, system_id: SystemId, label: &str) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE assessment_result SET feedback_status = ?1 WHERE system_id = ?2",
        params![label, system_id.0],
    )?;
    if updated == 0 {
        return Err(DiagnosisError::NotFound(format!(
            "no diagnosis results for system {}",
            system_id
        )));
    }
    log::info!(
        target: AUDIT_TARGET,
        "[Feedback] {} results of system {} marked '{}'",
        updated,
        system_id,
        label
    );
    Ok(updated)
}

/// Feedback on a system, newest first, optionally for one question number
pub fn list_feedback(
    conn: &Connection,
    system_id: SystemId,
    question_number: Option<u32>,
) -> Result<Vec<FeedbackEntry>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, 'quantitative', q.question_number, f.expert_id, f.content, f.created_at
           FROM feedback f
           JOIN quantitative_responses r ON f.quantitative_response_id = r.id
           JOIN quantitative_questions q ON r.question_id = q.id
          WHERE f.system_id = ?1 AND (?2 IS NULL OR q.question_number = ?2)
         UNION ALL
         SELECT f.id, 'qualitative', q.question_number, f.expert_id, f.content, f.created_at
           FROM feedback f
           JOIN qualitative_responses r ON f.qualitative_response_id = r.id
           JOIN qualitative_questions q ON r.question_id = q.id
          WHERE f.system_id = ?1 AND (?2 IS NULL OR q.question_number = ?2)
         ORDER BY 6 DESC, 1 DESC",
    )?;
    let rows = stmt
        .query_map(params![system_id.0, question_number], |row| {
            let battery = match row.get::<_, String>(1)?.as_str() {
                "qualitative" => Battery::Qualitative,
                _ => Battery::Quantitative,
            };
            Ok(FeedbackEntry {
                id: row.get(0)?,
                battery,
                question_number: row.get(2)?,
                expert_id: ExpertId(row.get(3)?),
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Most recent answer to the question, or a placeholder written for the expert.
///
/// The placeholder goes into the system's latest round for the battery under
/// `UserId(expert_id)`. Scoring is scoped to a (system, user) pair, so it
/// never reaches a user's result.
fn resolve_response(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    expert_id: ExpertId,
    question_id: i64,
    now: DateTime<Utc>,
) -> Result<StoredResponse> {
    if let Some(response) = ledger::most_recent_response(conn, battery, system_id, question_id)? {
        return Ok(response);
    }

    let round = latest_system_round(conn, battery, system_id)?.unwrap_or(1);
    let author = UserId(expert_id.0);
    let category = battery.placeholder_category();
    let id = ledger::upsert_response(
        conn,
        battery,
        system_id,
        author,
        question_id,
        round,
        category,
        None,
        None,
        now,
    )?;
    log::debug!(
        "[Feedback] placeholder {} answer {} created for system {} round {}",
        battery,
        id,
        system_id,
        round
    );

    Ok(StoredResponse {
        id,
        battery,
        system_id,
        user_id: author,
        question_id,
        round,
        category,
        comment: None,
        attachment: None,
        updated_at: now,
    })
}

fn latest_system_round(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
) -> Result<Option<u32>> {
    let sql = format!(
        "SELECT MAX(round) FROM {} WHERE system_id = ?1",
        battery.responses_table()
    );
    Ok(conn.query_row(&sql, params![system_id.0], |row| row.get(0))?)
}

fn insert_feedback(
    conn: &Connection,
    response: &StoredResponse,
    expert_id: ExpertId,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Feedback> {
    let assessment_result_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM assessment_result
              WHERE system_id = ?1 AND user_id = ?2 AND round = ?3",
            params![response.system_id.0, response.user_id.0, response.round],
            |row| row.get(0),
        )
        .optional()?;

    let target = FeedbackTarget::new(response.battery, response.id);
    let (quantitative_id, qualitative_id) = match target {
        FeedbackTarget::Quantitative(id) => (Some(id), None),
        FeedbackTarget::Qualitative(id) => (None, Some(id)),
    };

    conn.execute(
        "INSERT INTO feedback
            (system_id, user_id, expert_id, assessment_result_id,
             quantitative_response_id, qualitative_response_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            response.system_id.0,
            response.user_id.0,
            expert_id.0,
            assessment_result_id,
            quantitative_id,
            qualitative_id,
            content,
            now
        ],
    )?;

    Ok(Feedback {
        id: conn.last_insert_rowid(),
        system_id: response.system_id,
        user_id: response.user_id,
        expert_id,
        assessment_result_id,
        target,
        content: content.to_string(),
        created_at: now,
    })
}
