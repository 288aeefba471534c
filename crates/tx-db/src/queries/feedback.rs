//! Running per-learning outcome score, fed by the retrieval pipeline's
//! feedback stage (disabled by default; see the kernel config).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct LearningFeedback {
    pub learning_id: String,
    pub score: f64,
    pub sample_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for LearningFeedback {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(LearningFeedback {
            learning_id: row.try_get("learning_id")?,
            score: row.try_get("score")?,
            sample_count: row.try_get("sample_count")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn get(pool: &SqlitePool, learning_id: &str) -> Result<Option<LearningFeedback>, sqlx::Error> {
    sqlx::query_as::<_, LearningFeedback>("SELECT * FROM learning_feedback WHERE learning_id = ?")
        .bind(learning_id)
        .fetch_optional(pool)
        .await
}

/// Incorporate one new outcome sample into the running average:
/// `score' = (score * sample_count + outcome) / (sample_count + 1)`.
pub async fn record_outcome(
    pool: &SqlitePool,
    learning_id: &str,
    outcome: f64,
    now: DateTime<Utc>,
) -> Result<LearningFeedback, sqlx::Error> {
    sqlx::query(
        "INSERT INTO learning_feedback (learning_id, score, sample_count, updated_at) \
         VALUES (?, ?, 1, ?) \
         ON CONFLICT(learning_id) DO UPDATE SET \
           score = (learning_feedback.score * learning_feedback.sample_count + ?) / (learning_feedback.sample_count + 1), \
           sample_count = learning_feedback.sample_count + 1, \
           updated_at = ?",
    )
    .bind(learning_id)
    .bind(outcome)
    .bind(now)
    .bind(outcome)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, learning_id)
        .await
        .map(|row| row.expect("just upserted"))
}
