//! Learning corpus storage, including the FTS5-backed lexical search used
//! by the retrieval pipeline's stage 1 (`tx-core::retrieval`).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Learning, SourceType};

pub struct NewLearning<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub source_type: SourceType,
    pub source_ref: Option<&'a str>,
    pub keywords: &'a str,
    pub category: Option<&'a str>,
    pub embedding: Option<&'a [u8]>,
    pub now: DateTime<Utc>,
}

pub async fn insert_learning(pool: &SqlitePool, new_learning: &NewLearning<'_>) -> Result<Learning, sqlx::Error> {
    sqlx::query_as::<_, Learning>(
        "INSERT INTO learnings (id, content, source_type, source_ref, created_at, keywords, category, usage_count, embedding) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?) \
         RETURNING *",
    )
    .bind(new_learning.id)
    .bind(new_learning.content)
    .bind(new_learning.source_type.to_string())
    .bind(new_learning.source_ref)
    .bind(new_learning.now)
    .bind(new_learning.keywords)
    .bind(new_learning.category)
    .bind(new_learning.embedding)
    .fetch_one(pool)
    .await
}

pub async fn get_learning(pool: &SqlitePool, id: &str) -> Result<Option<Learning>, sqlx::Error> {
    sqlx::query_as::<_, Learning>("SELECT * FROM learnings WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_learnings_batch(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Learning>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!("SELECT * FROM learnings WHERE id IN ({placeholders})");
    let mut q = sqlx::query_as::<_, Learning>(&query);
    for id in ids {
        q = q.bind(id);
    }
    q.fetch_all(pool).await
}

pub async fn record_usage(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE learnings SET usage_count = usage_count + 1, last_used_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// A single full-text search result: learning id plus SQLite's `bm25()`
/// rank (more negative = better match).
pub struct FtsHit {
    pub learning_id: String,
    pub rank: f64,
}

/// Run an already-built FTS5 match expression (the three-tier
/// phrase/proximity/OR query is assembled by the caller, since it depends
/// on tokenizing the user's query string) and return ranked hits.
pub async fn fts_search(
    pool: &SqlitePool,
    match_expr: &str,
    limit: i64,
) -> Result<Vec<FtsHit>, sqlx::Error> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        "SELECT learnings.id, bm25(learnings_fts) AS rank \
         FROM learnings_fts \
         JOIN learnings ON learnings.rowid = learnings_fts.rowid \
         WHERE learnings_fts MATCH ? \
         ORDER BY rank \
         LIMIT ?",
    )
    .bind(match_expr)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(learning_id, rank)| FtsHit { learning_id, rank })
        .collect())
}

/// All learnings carrying a stored embedding, for the vector-search stage.
/// Loaded in full since SQLite has no native ANN index in this stack; a
/// production-scale corpus would shard this, but the retrieval contract
/// only requires a deterministic ranked result, not index-backed ANN.
pub async fn list_embedded(pool: &SqlitePool) -> Result<Vec<Learning>, sqlx::Error> {
    sqlx::query_as::<_, Learning>("SELECT * FROM learnings WHERE embedding IS NOT NULL")
        .fetch_all(pool)
        .await
}

pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Learning>, sqlx::Error> {
    sqlx::query_as::<_, Learning>("SELECT * FROM learnings ORDER BY created_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn delete_learning(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM learnings WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
