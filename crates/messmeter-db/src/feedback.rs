use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use messmeter_core::config::PointsConfig;
use messmeter_core::error::FeedbackError;
use messmeter_types::models::{MealFeedback, TxSource};
use messmeter_types::models::MealType;

use crate::models::FeedbackRow;
use crate::{ledger, Database};

/// Per-meal rollup feeding the AI summary job: submission count, summed
/// ratings per aspect, and word frequencies extracted from free text.
#[derive(Debug, Default, Serialize)]
pub struct MealStats {
    pub count: u64,
    #[serde(rename = "ratingsSum")]
    pub ratings_sum: HashMap<String, f64>,
    pub issues: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackAggregate {
    pub range: String,
    #[serde(rename = "totalFeedback")]
    pub total_feedback: u64,
    #[serde(rename = "dishStats")]
    pub dish_stats: HashMap<String, MealStats>,
}

impl Database {
    /// Store one feedback submission per (user, meal, day) and grant the
    /// meal-review points in the same transaction. De-duplication is the
    /// unique constraint itself, and the grant is keyed on the same triple,
    /// so a repeat submission can neither add a row nor re-pay.
    pub fn submit_feedback(
        &self,
        user_id: Uuid,
        meal: MealType,
        date: NaiveDate,
        ratings: &HashMap<String, f64>,
        text: &str,
        points: &PointsConfig,
    ) -> Result<(Uuid, i64), FeedbackError> {
        let mut conn = self.lock().map_err(FeedbackError::Store)?;
        let tx = conn.transaction().map_err(FeedbackError::store)?;
        let id = Uuid::new_v4();
        let key = format!("{}_{}_{}", user_id, meal.as_str(), date);

        let ratings_json = serde_json::to_string(ratings).map_err(FeedbackError::store)?;
        match tx.execute(
            "INSERT INTO meal_feedback (id, user_id, meal, date, ratings, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                user_id.to_string(),
                meal.as_str(),
                date.to_string(),
                ratings_json,
                text,
                Utc::now().to_rfc3339(),
            ],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(FeedbackError::AlreadySubmitted);
            }
            Err(e) => return Err(FeedbackError::store(e)),
        }

        let granted = ledger::append(
            &tx,
            &user_id.to_string(),
            points.meal_review,
            &format!("Meal feedback: {} on {}", meal, date),
            TxSource::MealReview,
            Some(&format!("feedback:{}", key)),
        )
        .map_err(FeedbackError::Store)?;

        tx.commit().map_err(FeedbackError::store)?;
        Ok((id, if granted { points.meal_review } else { 0 }))
    }

    pub fn list_feedback(&self, limit: u32) -> Result<Vec<MealFeedback>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, meal, date, ratings, text, created_at
                 FROM meal_feedback
                 ORDER BY created_at DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(FeedbackRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        meal: row.get(2)?,
                        date: row.get(3)?,
                        ratings: row.get(4)?,
                        text: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|r| r.into_feedback()).collect()
        })
    }

    /// Roll all stored feedback into the shape the summary generator expects.
    pub fn aggregate_feedback(&self) -> Result<FeedbackAggregate> {
        let feedback = self.list_feedback(u32::MAX)?;

        let mut dish_stats: HashMap<String, MealStats> = HashMap::new();
        let mut total_feedback = 0u64;

        for fb in &feedback {
            let stats = dish_stats.entry(fb.meal.as_str().to_string()).or_default();
            stats.count += 1;
            total_feedback += 1;

            for (aspect, value) in &fb.ratings {
                *stats.ratings_sum.entry(aspect.clone()).or_insert(0.0) += value;
            }

            for word in fb.text.to_lowercase().split_whitespace() {
                *stats.issues.entry(word.to_string()).or_insert(0) += 1;
            }
        }

        Ok(FeedbackAggregate {
            range: "weekly".to_string(),
            total_feedback,
            dish_stats,
        })
    }

    pub fn save_summary(&self, id: &str, period: &str, kind: &str, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ai_summaries (id, period, kind, content, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    period = excluded.period,
                    kind = excluded.kind,
                    content = excluded.content,
                    generated_at = excluded.generated_at",
                params![id, period, kind, content, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get_summary(&self, id: &str) -> Result<Option<(String, DateTime<Utc>)>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT content, generated_at FROM ai_summaries WHERE id = ?1",
                    [id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            Ok(row.map(|(content, generated_at)| {
                (content, crate::models::parse_timestamp(&generated_at))
            }))
        })
    }
}
