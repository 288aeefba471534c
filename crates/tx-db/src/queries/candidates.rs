use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Candidate, CandidateConfidence, CandidateStatus};

pub struct NewCandidate<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub confidence: CandidateConfidence,
    pub source_run_id: Option<&'a str>,
    pub source_task_id: Option<&'a str>,
    pub category: Option<&'a str>,
    pub keywords: &'a str,
    pub now: DateTime<Utc>,
}

pub async fn insert_candidate(pool: &SqlitePool, new_candidate: &NewCandidate<'_>) -> Result<Candidate, sqlx::Error> {
    sqlx::query_as::<_, Candidate>(
        "INSERT INTO candidates (id, content, confidence, status, source_run_id, source_task_id, category, keywords, created_at) \
         VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_candidate.id)
    .bind(new_candidate.content)
    .bind(new_candidate.confidence.to_string())
    .bind(new_candidate.source_run_id)
    .bind(new_candidate.source_task_id)
    .bind(new_candidate.category)
    .bind(new_candidate.keywords)
    .bind(new_candidate.now)
    .fetch_one(pool)
    .await
}

pub async fn get_candidate(pool: &SqlitePool, id: &str) -> Result<Option<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_pending(pool: &SqlitePool, limit: i64) -> Result<Vec<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>(
        "SELECT * FROM candidates WHERE status = 'pending' ORDER BY created_at ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Move a candidate out of `pending` into a terminal status (`promoted`,
/// `rejected`, or `merged`). Optimistic: only succeeds while the row is
/// still `pending`, since a candidate is resolved exactly once.
pub async fn resolve(
    pool: &SqlitePool,
    id: &str,
    to: CandidateStatus,
    merged_into_learning_id: Option<&str>,
) -> Result<Option<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>(
        "UPDATE candidates SET status = ?, merged_into_learning_id = ? \
         WHERE id = ? AND status = 'pending' \
         RETURNING *",
    )
    .bind(to.to_string())
    .bind(merged_into_learning_id)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn count_by_status(pool: &SqlitePool, status: CandidateStatus) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM candidates WHERE status = ?")
        .bind(status.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
