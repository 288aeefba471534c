use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::CompactionLogEntry;

pub async fn insert_entry(
    pool: &SqlitePool,
    ran_at: DateTime<Utc>,
    cutoff: DateTime<Utc>,
    tasks_deleted: i64,
    output_file: Option<&str>,
    summary: Option<&str>,
) -> Result<CompactionLogEntry, sqlx::Error> {
    sqlx::query_as::<_, CompactionLogEntry>(
        "INSERT INTO compaction_log (ran_at, cutoff, tasks_deleted, output_file, summary) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(ran_at)
    .bind(cutoff)
    .bind(tasks_deleted)
    .bind(output_file)
    .bind(summary)
    .fetch_one(pool)
    .await
}

pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<CompactionLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, CompactionLogEntry>(
        "SELECT * FROM compaction_log ORDER BY ran_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Tasks eligible for compaction: terminal status (done/failed/cancelled)
/// with `completed_at` at or before the cutoff, and no non-terminal child.
pub async fn find_compactable_task_ids(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM tasks \
         WHERE status IN ('done', 'failed', 'cancelled') \
           AND completed_at IS NOT NULL AND completed_at <= ? \
           AND id NOT IN ( \
             SELECT DISTINCT parent_id FROM tasks \
             WHERE parent_id IS NOT NULL \
               AND status NOT IN ('done', 'failed', 'cancelled') \
           )",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
