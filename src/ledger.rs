//! Response Ledger
//!
//! Stores one answer per (system, user, question, round) for each battery,
//! plus the self-assessment intake record that gates round completion.
//!
//! Re-submitting the same identity overwrites the answer in place. Comments
//! are only kept for consult requests; any other category stores NULL no
//! matter what the caller sent.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::catalog;
use crate::error::{DiagnosisError, Result};
use crate::models::{
    Battery, Intake, ResponseCategory, ResponseInput, SelfAssessment, StoredResponse, SubmitAck,
    SystemId, UserId,
};
use crate::rounds;
use crate::scoring::parse_category;
use crate::systems;

/// Upsert the intake record for a (system, user) pair.
pub fn save_intake(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
    intake: &Intake,
) -> Result<SelfAssessment> {
    if intake.organization.trim().is_empty() {
        return Err(DiagnosisError::missing("organization"));
    }
    if intake.user_scale.trim().is_empty() {
        return Err(DiagnosisError::missing("userScale"));
    }
    systems::require_system(conn, system_id)?;

    conn.execute(
        "INSERT INTO self_assessment (
            system_id, user_id, organization, user_scale, personal_info_system,
            member_info_homepage, external_data_provision, cctv_operation,
            task_outsourcing, personal_info_disposal
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(system_id, user_id) DO UPDATE SET
            organization = excluded.organization,
            user_scale = excluded.user_scale,
            personal_info_system = excluded.personal_info_system,
            member_info_homepage = excluded.member_info_homepage,
            external_data_provision = excluded.external_data_provision,
            cctv_operation = excluded.cctv_operation,
            task_outsourcing = excluded.task_outsourcing,
            personal_info_disposal = excluded.personal_info_disposal",
        params![
            system_id.0,
            user_id.0,
            intake.organization.trim(),
            intake.user_scale.trim(),
            intake.personal_info_system,
            intake.member_info_homepage,
            intake.external_data_provision,
            intake.cctv_operation,
            intake.task_outsourcing,
            intake.personal_info_disposal
        ],
    )?;
    log::info!("[Ledger] intake saved for system {} user {}", system_id, user_id);

    find_intake(conn, system_id, user_id)?
        .ok_or_else(|| DiagnosisError::Transaction("intake row vanished after upsert".to_string()))
}

pub fn find_intake(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
) -> Result<Option<SelfAssessment>> {
    Ok(conn
        .query_row(
            "SELECT id, organization, user_scale, personal_info_system, member_info_homepage,
                    external_data_provision, cctv_operation, task_outsourcing,
                    personal_info_disposal
             FROM self_assessment WHERE system_id = ?1 AND user_id = ?2",
            params![system_id.0, user_id.0],
            |row| {
                Ok(SelfAssessment {
                    id: row.get(0)?,
                    system_id,
                    user_id,
                    intake: Intake {
                        organization: row.get(1)?,
                        user_scale: row.get(2)?,
                        personal_info_system: row.get(3)?,
                        member_info_homepage: row.get(4)?,
                        external_data_provision: row.get(5)?,
                        cctv_operation: row.get(6)?,
                        task_outsourcing: row.get(7)?,
                        personal_info_disposal: row.get(8)?,
                    },
                })
            },
        )
        .optional()?)
}

/// Store a batch of answers for one battery and round.
///
/// Only the pair's open round (last committed + 1) accepts answers; committed
/// rounds are frozen.
/// Every question number is resolved before anything is written, so an
/// unknown question rejects the batch as a whole. Callers run this inside a
/// single transaction.
pub fn submit_responses(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    user_id: UserId,
    round: u32,
    entries: &[ResponseInput],
) -> Result<SubmitAck> {
    if round == 0 {
        return Err(DiagnosisError::Validation(
            "round numbers start at 1".to_string(),
        ));
    }
    if entries.is_empty() {
        return Err(DiagnosisError::Validation(
            "response batch is empty".to_string(),
        ));
    }
    systems::require_system(conn, system_id)?;

    let open_round = rounds::next_round(conn, system_id, user_id)?;
    if round != open_round {
        log::warn!(
            "[Ledger] rejecting batch for system {} user {}: round {} is not open (open round is {})",
            system_id,
            user_id,
            round,
            open_round
        );
        let reason = if round < open_round {
            format!("round {} is already committed", round)
        } else {
            format!("round {} is not open yet; answers go to round {}", round, open_round)
        };
        return Err(DiagnosisError::Validation(reason));
    }

    let mut resolved = Vec::with_capacity(entries.len());
    for entry in entries {
        let question_id = catalog::find_question_id(conn, battery, entry.question_number)?
            .ok_or_else(|| {
                log::warn!(
                    "[Ledger] rejecting batch: unknown {} question {}",
                    battery,
                    entry.question_number
                );
                DiagnosisError::UnknownQuestion {
                    battery: battery.as_str().to_string(),
                    number: entry.question_number,
                }
            })?;
        resolved.push((question_id, entry));
    }

    let now = Utc::now();
    for (question_id, entry) in &resolved {
        upsert_response(
            conn,
            battery,
            system_id,
            user_id,
            *question_id,
            round,
            entry.category,
            entry.comment.as_deref(),
            entry.attachment.as_deref(),
            now,
        )?;
    }

    log::info!(
        "[Ledger] stored {} {} answers for system {} user {} round {}",
        resolved.len(),
        battery,
        system_id,
        user_id,
        round
    );
    Ok(SubmitAck {
        battery,
        round,
        stored: resolved.len(),
    })
}

/// Drop the comment unless the category asks for a consult
pub fn sanitize_comment(category: ResponseCategory, comment: Option<&str>) -> Option<String> {
    if !category.keeps_comment() {
        return None;
    }
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Insert or overwrite one answer and return its row id.
#[allow(clippy::too_many_arguments)]
pub(crate) fn upsert_response(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    user_id: UserId,
    question_id: i64,
    round: u32,
    category: ResponseCategory,
    comment: Option<&str>,
    attachment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64> {
    let comment = sanitize_comment(category, comment);
    let attachment = attachment.map(str::trim).filter(|a| !a.is_empty());

    let sql = format!(
        "INSERT INTO {} (system_id, user_id, question_id, round, category, comment, attachment, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(system_id, user_id, question_id, round) DO UPDATE SET
            category = excluded.category,
            comment = excluded.comment,
            attachment = excluded.attachment,
            updated_at = excluded.updated_at
         RETURNING id",
        battery.responses_table()
    );
    let id = conn.query_row(
        &sql,
        params![
            system_id.0,
            user_id.0,
            question_id,
            round,
            category.as_str(),
            comment,
            attachment,
            now
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Stored answers of one user for one round, in question order
pub fn responses_for(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    user_id: UserId,
    round: u32,
) -> Result<Vec<StoredResponse>> {
    let sql = format!(
        "SELECT r.id, r.system_id, r.user_id, r.question_id, r.round, r.category,
                r.comment, r.attachment, r.updated_at
         FROM {} r JOIN {} q ON r.question_id = q.id
         WHERE r.system_id = ?1 AND r.user_id = ?2 AND r.round = ?3
         ORDER BY q.question_number",
        battery.responses_table(),
        battery.questions_table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![system_id.0, user_id.0, round], |row| {
            map_stored(battery, row)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Most recently updated answer to a question for a system, across users and rounds
pub fn most_recent_response(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    question_id: i64,
) -> Result<Option<StoredResponse>> {
    let sql = format!(
        "SELECT id, system_id, user_id, question_id, round, category,
                comment, attachment, updated_at
         FROM {} WHERE system_id = ?1 AND question_id = ?2
         ORDER BY updated_at DESC, id DESC LIMIT 1",
        battery.responses_table()
    );
    Ok(conn
        .query_row(&sql, params![system_id.0, question_id], |row| {
            map_stored(battery, row)
        })
        .optional()?)
}

/// Highest round with answers in a battery for a (system, user) pair
pub fn latest_response_round(
    conn: &Connection,
    battery: Battery,
    system_id: SystemId,
    user_id: UserId,
) -> Result<Option<u32>> {
    let sql = format!(
        "SELECT MAX(round) FROM {} WHERE system_id = ?1 AND user_id = ?2",
        battery.responses_table()
    );
    Ok(conn.query_row(&sql, params![system_id.0, user_id.0], |row| row.get(0))?)
}

fn map_stored(battery: Battery, row: &Row<'_>) -> rusqlite::Result<StoredResponse> {
    Ok(StoredResponse {
        id: row.get(0)?,
        battery,
        system_id: SystemId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        question_id: row.get(3)?,
        round: row.get(4)?,
        category: parse_category(row.get(5)?, 5)?,
        comment: row.get(6)?,
        attachment: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
