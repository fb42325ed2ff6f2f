//! Category Gap Analyzer
//!
//! Achieved against maximum quantitative points per catalog category for the
//! latest answered round of a (system, user) pair, weakest category first.

use rusqlite::{params, Connection};
use std::cmp::Ordering;

use crate::error::Result;
use crate::ledger;
use crate::models::{Battery, CategoryComparison, CategoryGap, SystemId, UserId};

/// Compare categories for the pair's latest quantitative round
pub fn compare_categories(
    conn: &Connection,
    system_id: SystemId,
    user_id: UserId,
) -> Result<CategoryComparison> {
    let round =
        match ledger::latest_response_round(conn, Battery::Quantitative, system_id, user_id)? {
            Some(round) => round,
            None => {
                log::debug!(
                    "[Gap] no quantitative answers for system {} user {}",
                    system_id,
                    user_id
                );
                return Ok(CategoryComparison::no_diagnosis());
            }
        };

    let mut stmt = conn.prepare(
        "SELECT c.id, c.name,
                COALESCE((SELECT SUM(qq.score_fulfilled) FROM quantitative_questions qq
                           WHERE qq.category_id = c.id), 0.0),
                COALESCE((SELECT SUM(CASE qr.category
                                      WHEN 'fulfilled' THEN qq.score_fulfilled
                                      WHEN 'unfulfilled' THEN qq.score_unfulfilled
                                      WHEN 'consult_needed' THEN qq.score_consult
                                      WHEN 'not_applicable' THEN qq.score_not_applicable
                                      ELSE 0.0 END)
                            FROM quantitative_responses qr
                            JOIN quantitative_questions qq ON qr.question_id = qq.id
                           WHERE qq.category_id = c.id AND qr.system_id = ?1
                             AND qr.user_id = ?2 AND qr.round = ?3), 0.0)
         FROM categories c",
    )?;
    let mut gaps = stmt
        .query_map(params![system_id.0, user_id.0, round], |row| {
            let maximum: f64 = row.get(2)?;
            let achieved: f64 = row.get(3)?;
            Ok(CategoryGap {
                category_id: row.get(0)?,
                category: row.get(1)?,
                achieved,
                maximum,
                percentage: percentage(achieved, maximum),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    sort_weakest_first(&mut gaps);
    Ok(CategoryComparison {
        has_diagnosis: true,
        round: Some(round),
        data: Some(gaps),
    })
}

/// `None` when the category cannot score anything
pub fn percentage(achieved: f64, maximum: f64) -> Option<f64> {
    if maximum > 0.0 {
        Some(achieved / maximum * 100.0)
    } else {
        None
    }
}

/// Ascending percentage, undefined percentages last, ties by name
pub fn sort_weakest_first(gaps: &mut [CategoryGap]) {
    gaps.sort_by(|a, b| {
        let by_percentage = match (a.percentage, b.percentage) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_percentage.then_with(|| a.category.cmp(&b.category))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(name: &str, percentage: Option<f64>) -> CategoryGap {
        CategoryGap {
            category_id: 0,
            category: name.to_string(),
            achieved: 0.0,
            maximum: 0.0,
            percentage,
        }
    }

    #[test]
    fn test_zero_maximum_has_no_percentage() {
        assert_eq!(percentage(3.0, 0.0), None);
        assert_eq!(percentage(5.0, 10.0), Some(50.0));
    }

    #[test]
    fn test_weakest_first_with_undefined_last() {
        let mut gaps = vec![
            gap("Retention", None),
            gap("Disposal", Some(80.0)),
            gap("Collection", Some(20.0)),
            gap("Access", Some(80.0)),
        ];
        sort_weakest_first(&mut gaps);
        let names: Vec<&str> = gaps.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["Collection", "Access", "Disposal", "Retention"]);
    }
}
