//! Compliance Scoring Engine
//!
//! Maps a round's responses, joined against the question catalog, to a
//! numeric score and a letter grade.
//!
//! ## Architecture
//! - **Quantitative battery**: every response category selects one of the
//!   question's four point values
//! - **Qualitative battery**: only consult-needed and not-applicable award
//!   points, the other categories contribute zero
//! - **Grade**: descending threshold bands over the summed points
//!   (S ≥ 90, A ≥ 80, B ≥ 70, C ≥ 60, else D)
//!
//! The engine is read-only. Persisting the outcome is the round lifecycle's job.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::models::{QualitativePoints, QuantitativePoints, ResponseCategory, SystemId, UserId};

/// Letter grade derived from the weighted score
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

/// Lower bound of each band, best grade first
const GRADE_BANDS: [(f64, Grade); 4] = [
    (90.0, Grade::S),
    (80.0, Grade::A),
    (70.0, Grade::B),
    (60.0, Grade::C),
];

impl Grade {
    /// Grade for a weighted score
    pub fn from_score(score: f64) -> Grade {
        GRADE_BANDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::D)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    /// Get a brief description of this grade
    pub fn description(&self) -> &'static str {
        match self {
            Grade::S => "Exemplary protection of personal information",
            Grade::A => "Strong compliance with minor gaps",
            Grade::B => "Adequate compliance, several areas need attention",
            Grade::C => "Partial compliance, improvement plan recommended",
            Grade::D => "Insufficient compliance, expert consultation advised",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "S" => Ok(Grade::S),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            _ => Err(format!("Unknown grade: {}", s)),
        }
    }
}

/// Score and grade of one round
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: f64,
    pub grade: Grade,
}

/// Pure scorer over already-joined responses
#[derive(Debug, Default)]
pub struct ComplianceScorer;

impl ComplianceScorer {
    pub fn new() -> Self {
        ComplianceScorer
    }

    /// Score a round from its joined quantitative and qualitative answers
    pub fn score(
        &self,
        quantitative: &[(QuantitativePoints, ResponseCategory)],
        qualitative: &[(QualitativePoints, ResponseCategory)],
    ) -> ScoreCard {
        let quantitative_total: f64 = quantitative
            .iter()
            .map(|(points, category)| points.points_for(*category))
            .sum();
        let qualitative_total: f64 = qualitative
            .iter()
            .map(|(points, category)| points.points_for(*category))
            .sum();

        let score = quantitative_total + qualitative_total;
        ScoreCard {
            score,
            grade: Grade::from_score(score),
        }
    }
}

/// Compute the score of one round of a (system, user) pair from the stored
/// responses.
///
/// Only the pair's own answers count. Other users of the system and expert
/// feedback placeholders live under different user ids and never contribute.
/// Works on any connection, including an open transaction, so that round
/// completion can score and commit under the same lock.
pub fn compute_score(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
    round: u32,
) -> Result<ScoreCard> {
    let mut stmt = conn.prepare(
        "SELECT qr.category, qq.score_fulfilled, qq.score_unfulfilled,
                qq.score_consult, qq.score_not_applicable
         FROM quantitative_responses qr
         JOIN quantitative_questions qq ON qr.question_id = qq.id
         WHERE qr.system_id = ?1 AND qr.user_id = ?2 AND qr.round = ?3",
    )?;
    let quantitative = stmt
        .query_map(params![system_id.0, user_id.0, round], |row| {
            let category = parse_category(row.get::<_, String>(0)?, 0)?;
            let points = QuantitativePoints {
                fulfilled: row.get(1)?,
                unfulfilled: row.get(2)?,
                consult: row.get(3)?,
                not_applicable: row.get(4)?,
            };
            Ok((points, category))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT qr.category, qq.score_consult, qq.score_not_applicable
         FROM qualitative_responses qr
         JOIN qualitative_questions qq ON qr.question_id = qq.id
         WHERE qr.system_id = ?1 AND qr.user_id = ?2 AND qr.round = ?3",
    )?;
    let qualitative = stmt
        .query_map(params![system_id.0, user_id.0, round], |row| {
            let category = parse_category(row.get::<_, String>(0)?, 0)?;
            let points = QualitativePoints {
                consult: row.get(1)?,
                not_applicable: row.get(2)?,
            };
            Ok((points, category))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let card = ComplianceScorer::new().score(&quantitative, &qualitative);
    log::debug!(
        "[Scoring] system {} user {} round {}: {} quantitative + {} qualitative answers -> {} ({})",
        system_id,
        user_id,
        round,
        quantitative.len(),
        qualitative.len(),
        card.score,
        card.grade
    );
    Ok(card)
}

/// Decode a stored category column, surfacing unknown values as a conversion error
pub(crate) fn parse_category(raw: String, column: usize) -> rusqlite::Result<ResponseCategory> {
    raw.parse::<ResponseCategory>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

/// Decode a stored grade column
pub(crate) fn parse_grade(raw: String, column: usize) -> rusqlite::Result<Grade> {
    raw.parse::<Grade>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}
