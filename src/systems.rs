//! Systems under assessment and their lifecycle status.
//!
//! Registration itself belongs to the account service; `register_system`
//! only records the minimum the engine needs (owner, name, status).

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

use crate::error::{DiagnosisError, Result};
use crate::models::{System, SystemId, SystemStatus, UserId};

pub fn register_system(conn: &Connection, owner: UserId, name: &str) -> Result<System> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DiagnosisError::missing("name"));
    }

    conn.execute(
        "INSERT INTO systems (user_id, name, status) VALUES (?1, ?2, ?3)",
        params![owner.0, name, SystemStatus::NotStarted.as_str()],
    )?;
    let id = SystemId(conn.last_insert_rowid());
    log::info!("[Systems] registered system {} ({}) for user {}", id, name, owner);

    Ok(System {
        id,
        owner,
        name: name.to_string(),
        status: SystemStatus::NotStarted,
    })
}

/// Fetch a system, reporting `InProgress` for not-started systems that already have answers
pub fn get_system(conn: &Connection, system_id: SystemId) -> Result<System> {
    let row = conn
        .query_row(
            "SELECT id, user_id, name, status FROM systems WHERE id = ?1",
            params![system_id.0],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let (id, owner, name, status) =
        row.ok_or_else(|| DiagnosisError::NotFound(format!("system {}", system_id)))?;
    let mut status = status
        .parse::<SystemStatus>()
        .map_err(DiagnosisError::Transaction)?;

    if status == SystemStatus::NotStarted && has_any_response(conn, system_id)? {
        status = SystemStatus::InProgress;
    }

    Ok(System {
        id: SystemId(id),
        owner: UserId(owner),
        name,
        status,
    })
}

/// Fail with `NotFound` unless the system exists
pub fn require_system(conn: &Connection, system_id: SystemId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM systems WHERE id = ?1)",
        params![system_id.0],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(DiagnosisError::NotFound(format!("system {}", system_id)))
    }
}

/// Transition a system to completed. Returns whether the status changed.
pub(crate) fn mark_completed(conn: &Connection, system_id: SystemId) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE systems SET status = ?1 WHERE id = ?2 AND status <> ?1",
        params![SystemStatus::Completed.as_str(), system_id.0],
    )?;
    Ok(changed > 0)
}

/// Map of every system that has committed results to whether it has any
pub fn assessment_statuses(conn: &Connection) -> Result<BTreeMap<SystemId, bool>> {
    let mut stmt = conn.prepare(
        "SELECT system_id, COUNT(*) > 0 FROM assessment_result GROUP BY system_id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((SystemId(row.get(0)?), row.get::<_, bool>(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(rows)
}

fn has_any_response(conn: &Connection, system_id: SystemId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM quantitative_responses WHERE system_id = ?1)
             OR EXISTS(SELECT 1 FROM qualitative_responses WHERE system_id = ?1)",
        params![system_id.0],
        |row| row.get(0),
    )?)
}
