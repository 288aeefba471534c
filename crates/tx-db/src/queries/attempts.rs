use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Attempt, AttemptOutcome};

pub struct NewAttempt<'a> {
    pub id: &'a str,
    pub task_id: &'a str,
    pub approach: &'a str,
    pub outcome: AttemptOutcome,
    pub reason: Option<&'a str>,
    pub now: DateTime<Utc>,
}

pub async fn insert_attempt(pool: &SqlitePool, new_attempt: &NewAttempt<'_>) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        "INSERT INTO attempts (id, task_id, approach, outcome, reason, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_attempt.id)
    .bind(new_attempt.task_id)
    .bind(new_attempt.approach)
    .bind(new_attempt.outcome.to_string())
    .bind(new_attempt.reason)
    .bind(new_attempt.now)
    .fetch_one(pool)
    .await
}

pub async fn get_attempt(pool: &SqlitePool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_attempts_for_task(
    pool: &SqlitePool,
    task_id: &str,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        "SELECT * FROM attempts WHERE task_id = ? ORDER BY created_at ASC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}
