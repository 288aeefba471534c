use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{AnchorInvalidation, AnchorStatus, LearningAnchor};

pub struct NewAnchor<'a> {
    pub id: &'a str,
    pub learning_id: &'a str,
    pub anchor_type: &'a str,
    pub file_path: &'a str,
    pub symbol_fqname: Option<&'a str>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub content_hash: Option<&'a str>,
    pub pinned: bool,
}

pub async fn insert_anchor(pool: &SqlitePool, new_anchor: &NewAnchor<'_>) -> Result<LearningAnchor, sqlx::Error> {
    sqlx::query_as::<_, LearningAnchor>(
        "INSERT INTO learning_anchors (id, learning_id, anchor_type, file_path, symbol_fqname, line_start, line_end, content_hash, status, pinned, verified_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'valid', ?, NULL) \
         RETURNING *",
    )
    .bind(new_anchor.id)
    .bind(new_anchor.learning_id)
    .bind(new_anchor.anchor_type)
    .bind(new_anchor.file_path)
    .bind(new_anchor.symbol_fqname)
    .bind(new_anchor.line_start)
    .bind(new_anchor.line_end)
    .bind(new_anchor.content_hash)
    .bind(new_anchor.pinned)
    .fetch_one(pool)
    .await
}

pub async fn get_anchor(pool: &SqlitePool, id: &str) -> Result<Option<LearningAnchor>, sqlx::Error> {
    sqlx::query_as::<_, LearningAnchor>("SELECT * FROM learning_anchors WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_learning(pool: &SqlitePool, learning_id: &str) -> Result<Vec<LearningAnchor>, sqlx::Error> {
    sqlx::query_as::<_, LearningAnchor>("SELECT * FROM learning_anchors WHERE learning_id = ?")
        .bind(learning_id)
        .fetch_all(pool)
        .await
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<LearningAnchor>, sqlx::Error> {
    sqlx::query_as::<_, LearningAnchor>("SELECT * FROM learning_anchors")
        .fetch_all(pool)
        .await
}

/// Updates the anchor's latest-observation columns and appends a row to
/// the append-only invalidation log, atomically.
pub async fn set_status(
    pool: &SqlitePool,
    id: &str,
    status: AnchorStatus,
    verified_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE learning_anchors SET status = ?, verified_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(verified_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() > 0 {
        sqlx::query("INSERT INTO anchor_invalidations (anchor_id, status, verified_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(status.to_string())
            .bind(verified_at)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(result.rows_affected())
}

pub async fn list_invalidations(pool: &SqlitePool, anchor_id: &str) -> Result<Vec<AnchorInvalidation>, sqlx::Error> {
    sqlx::query_as::<_, AnchorInvalidation>(
        "SELECT * FROM anchor_invalidations WHERE anchor_id = ? ORDER BY id ASC",
    )
    .bind(anchor_id)
    .fetch_all(pool)
    .await
}

pub async fn set_pinned(pool: &SqlitePool, id: &str, pinned: bool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE learning_anchors SET pinned = ? WHERE id = ?")
        .bind(pinned)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Per-status counts for an anchor-health summary, keyed by status string.
pub async fn status_summary(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT status, COUNT(*) FROM learning_anchors GROUP BY status")
        .fetch_all(pool)
        .await
}
