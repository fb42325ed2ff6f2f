//! Question Catalog
//!
//! Quantitative and qualitative question batteries plus the categories that
//! group quantitative questions. The catalog is reference data owned by the
//! question-bank service; the engine imports it from a seed file and only
//! reads it afterwards.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::models::{
    Battery, Category, QualitativePoints, QualitativeQuestion, QuantitativePoints,
    QuantitativeQuestion,
};

/// Raw question-bank records as exported by the question-bank service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub categories: Vec<String>,
    pub quantitative: Vec<QuantitativeSeed>,
    pub qualitative: Vec<QualitativeSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeSeed {
    pub question_number: u32,
    pub question: String,
    /// Category name; must be listed in `categories`
    pub category: Option<String>,
    pub points: QuantitativePoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeSeed {
    pub question_number: u32,
    pub indicator: String,
    pub indicator_definition: Option<String>,
    pub points: QualitativePoints,
}

/// Counts of rows written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub categories: usize,
    pub quantitative: usize,
    pub qualitative: usize,
}

/// Load a catalog seed from a JSON file.
pub fn load_seed_from_file(path: &Path) -> std::result::Result<CatalogSeed, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!("Catalog seed not found at: {}", path.display()))
        } else {
            ConfigError::IoError(e)
        }
    })?;
    let seed: CatalogSeed = serde_json::from_str(&content)?;
    validate_seed(&seed)?;
    Ok(seed)
}

/// Reject seeds with duplicate question numbers or dangling category names
pub fn validate_seed(seed: &CatalogSeed) -> std::result::Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for q in &seed.quantitative {
        if !seen.insert(q.question_number) {
            return Err(ConfigError::ValidationFailed(format!(
                "Duplicate quantitative question number: {}",
                q.question_number
            )));
        }
        if let Some(category) = &q.category {
            if !seed.categories.iter().any(|c| c == category) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Question {} references unknown category '{}'",
                    q.question_number, category
                )));
            }
        }
    }

    seen.clear();
    for q in &seed.qualitative {
        if !seen.insert(q.question_number) {
            return Err(ConfigError::ValidationFailed(format!(
                "Duplicate qualitative question number: {}",
                q.question_number
            )));
        }
    }
    Ok(())
}

/// Upsert every seed record, keyed by category name and question number.
pub fn import_catalog(conn: &Connection, seed: &CatalogSeed) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for name in &seed.categories {
        conn.execute(
            "INSERT INTO categories (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        summary.categories += 1;
    }

    for q in &seed.quantitative {
        let category_id = match &q.category {
            Some(name) => conn
                .query_row(
                    "SELECT id FROM categories WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?,
            None => None,
        };
        conn.execute(
            "INSERT INTO quantitative_questions
                (question_number, question, category_id, score_fulfilled,
                 score_unfulfilled, score_consult, score_not_applicable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(question_number) DO UPDATE SET
                question = excluded.question,
                category_id = excluded.category_id,
                score_fulfilled = excluded.score_fulfilled,
                score_unfulfilled = excluded.score_unfulfilled,
                score_consult = excluded.score_consult,
                score_not_applicable = excluded.score_not_applicable",
            params![
                q.question_number,
                q.question,
                category_id,
                q.points.fulfilled,
                q.points.unfulfilled,
                q.points.consult,
                q.points.not_applicable
            ],
        )?;
        summary.quantitative += 1;
    }

    for q in &seed.qualitative {
        conn.execute(
            "INSERT INTO qualitative_questions
                (question_number, indicator, indicator_definition,
                 score_consult, score_not_applicable)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(question_number) DO UPDATE SET
                indicator = excluded.indicator,
                indicator_definition = excluded.indicator_definition,
                score_consult = excluded.score_consult,
                score_not_applicable = excluded.score_not_applicable",
            params![
                q.question_number,
                q.indicator,
                q.indicator_definition,
                q.points.consult,
                q.points.not_applicable
            ],
        )?;
        summary.qualitative += 1;
    }

    log::info!(
        "[Catalog] imported {} categories, {} quantitative and {} qualitative questions",
        summary.categories,
        summary.quantitative,
        summary.qualitative
    );
    Ok(summary)
}

/// Resolve a stable question number to the question's row id
pub fn find_question_id(conn: &Connection, battery: Battery, number: u32) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE question_number = ?1",
        battery.questions_table()
    );
    Ok(conn
        .query_row(&sql, params![number], |row| row.get(0))
        .optional()?)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_quantitative(conn: &Connection) -> Result<Vec<QuantitativeQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, question_number, category_id, question, score_fulfilled,
                score_unfulfilled, score_consult, score_not_applicable
         FROM quantitative_questions ORDER BY question_number",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(QuantitativeQuestion {
                id: row.get(0)?,
                question_number: row.get(1)?,
                category_id: row.get(2)?,
                question: row.get(3)?,
                points: QuantitativePoints {
                    fulfilled: row.get(4)?,
                    unfulfilled: row.get(5)?,
                    consult: row.get(6)?,
                    not_applicable: row.get(7)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_qualitative(conn: &Connection) -> Result<Vec<QualitativeQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, question_number, indicator, indicator_definition,
                score_consult, score_not_applicable
         FROM qualitative_questions ORDER BY question_number",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(QualitativeQuestion {
                id: row.get(0)?,
                question_number: row.get(1)?,
                indicator: row.get(2)?,
                indicator_definition: row.get(3)?,
                points: QualitativePoints {
                    consult: row.get(4)?,
                    not_applicable: row.get(5)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema;
    use std::io::Write;
    use tempfile::TempDir;

    fn seed() -> CatalogSeed {
        CatalogSeed {
            categories: vec!["Collection".to_string(), "Disposal".to_string()],
            quantitative: vec![QuantitativeSeed {
                question_number: 1,
                question: "Is consent collected before processing?".to_string(),
                category: Some("Collection".to_string()),
                points: QuantitativePoints {
                    fulfilled: 10.0,
                    unfulfilled: 0.0,
                    consult: 3.0,
                    not_applicable: 1.0,
                },
            }],
            qualitative: vec![QualitativeSeed {
                question_number: 1,
                indicator: "Privacy governance".to_string(),
                indicator_definition: None,
                points: QualitativePoints {
                    consult: 2.0,
                    not_applicable: 1.0,
                },
            }],
        }
    }

    #[test]
    fn test_import_then_list() {
        let conn = Connection::open_in_memory().unwrap();
        schema::bootstrap(&conn).unwrap();

        let summary = import_catalog(&conn, &seed()).unwrap();
        assert_eq!(summary.quantitative, 1);

        let categories = list_categories(&conn).unwrap();
        assert_eq!(categories.len(), 2);

        let questions = list_quantitative(&conn).unwrap();
        assert_eq!(questions[0].category_id, Some(categories[0].id));
        assert_eq!(questions[0].points.fulfilled, 10.0);

        assert_eq!(list_qualitative(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_reimport_updates_in_place() {
        let conn = Connection::open_in_memory().unwrap();
        schema::bootstrap(&conn).unwrap();
        import_catalog(&conn, &seed()).unwrap();

        let mut changed = seed();
        changed.quantitative[0].points.fulfilled = 12.0;
        import_catalog(&conn, &changed).unwrap();

        let questions = list_quantitative(&conn).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].points.fulfilled, 12.0);
    }

    #[test]
    fn test_find_question_id_by_number() {
        let conn = Connection::open_in_memory().unwrap();
        schema::bootstrap(&conn).unwrap();
        import_catalog(&conn, &seed()).unwrap();

        assert!(find_question_id(&conn, Battery::Quantitative, 1)
            .unwrap()
            .is_some());
        assert!(find_question_id(&conn, Battery::Qualitative, 2)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_category() {
        let mut bad = seed();
        bad.quantitative[0].category = Some("Retention".to_string());
        assert!(matches!(
            validate_seed(&bad),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_numbers() {
        let mut bad = seed();
        bad.qualitative.push(bad.qualitative[0].clone());
        assert!(validate_seed(&bad).is_err());
    }

    #[test]
    fn test_load_seed_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&seed()).unwrap().as_bytes())
            .unwrap();

        assert_eq!(load_seed_from_file(&path).unwrap(), seed());
        assert!(matches!(
            load_seed_from_file(&temp_dir.path().join("missing.json")),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
