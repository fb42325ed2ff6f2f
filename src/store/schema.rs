//! Relational schema for the diagnosis store.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS systems (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'not_started'
);

CREATE TABLE IF NOT EXISTS categories (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS quantitative_questions (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    question_number      INTEGER NOT NULL UNIQUE,
    question             TEXT NOT NULL,
    category_id          INTEGER REFERENCES categories(id),
    score_fulfilled      REAL NOT NULL DEFAULT 0,
    score_unfulfilled    REAL NOT NULL DEFAULT 0,
    score_consult        REAL NOT NULL DEFAULT 0,
    score_not_applicable REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS qualitative_questions (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    question_number      INTEGER NOT NULL UNIQUE,
    indicator            TEXT NOT NULL,
    indicator_definition TEXT,
    score_consult        REAL NOT NULL DEFAULT 0,
    score_not_applicable REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS self_assessment (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id               INTEGER NOT NULL REFERENCES systems(id),
    user_id                 INTEGER NOT NULL,
    organization            TEXT NOT NULL,
    user_scale              TEXT NOT NULL,
    personal_info_system    INTEGER NOT NULL DEFAULT 0,
    member_info_homepage    INTEGER NOT NULL DEFAULT 0,
    external_data_provision INTEGER NOT NULL DEFAULT 0,
    cctv_operation          INTEGER NOT NULL DEFAULT 0,
    task_outsourcing        INTEGER NOT NULL DEFAULT 0,
    personal_info_disposal  INTEGER NOT NULL DEFAULT 0,
    UNIQUE (system_id, user_id)
);

CREATE TABLE IF NOT EXISTS quantitative_responses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id   INTEGER NOT NULL REFERENCES systems(id),
    user_id     INTEGER NOT NULL,
    question_id INTEGER NOT NULL REFERENCES quantitative_questions(id),
    round       INTEGER NOT NULL,
    category    TEXT NOT NULL,
    comment     TEXT,
    attachment  TEXT,
    updated_at  TEXT NOT NULL,
    UNIQUE (system_id, user_id, question_id, round)
);

CREATE TABLE IF NOT EXISTS qualitative_responses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id   INTEGER NOT NULL REFERENCES systems(id),
    user_id     INTEGER NOT NULL,
    question_id INTEGER NOT NULL REFERENCES qualitative_questions(id),
    round       INTEGER NOT NULL,
    category    TEXT NOT NULL,
    comment     TEXT,
    attachment  TEXT,
    updated_at  TEXT NOT NULL,
    UNIQUE (system_id, user_id, question_id, round)
);

CREATE TABLE IF NOT EXISTS assessment_result (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id       INTEGER NOT NULL REFERENCES systems(id),
    user_id         INTEGER NOT NULL,
    round           INTEGER NOT NULL,
    assessment_id   INTEGER NOT NULL REFERENCES self_assessment(id),
    score           REAL NOT NULL,
    grade           TEXT NOT NULL,
    feedback_status TEXT NOT NULL,
    completed_at    TEXT NOT NULL,
    UNIQUE (system_id, user_id, round)
);

CREATE TABLE IF NOT EXISTS feedback (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id                INTEGER NOT NULL REFERENCES systems(id),
    user_id                  INTEGER NOT NULL,
    expert_id                INTEGER NOT NULL,
    assessment_result_id     INTEGER REFERENCES assessment_result(id),
    quantitative_response_id INTEGER REFERENCES quantitative_responses(id),
    qualitative_response_id  INTEGER REFERENCES qualitative_responses(id),
    content                  TEXT NOT NULL,
    created_at               TEXT NOT NULL,
    CHECK ((quantitative_response_id IS NULL) <> (qualitative_response_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_quantitative_responses_recent
    ON quantitative_responses (system_id, question_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_qualitative_responses_recent
    ON qualitative_responses (system_id, question_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_feedback_system
    ON feedback (system_id, created_at);
";

/// Create every table and index that does not exist yet
pub fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        log::info!(
            "[Store] schema bootstrapped (version {} -> {})",
            version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}
