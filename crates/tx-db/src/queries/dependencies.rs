//! Task dependency edges.
//!
//! An edge `(blocker_id, blocked_id)` means `blocked_id` depends on
//! `blocker_id`: `blocker_id` must reach `done` before `blocked_id` can.
//! Cycle detection is the caller's responsibility (`tx-core`'s dependency
//! engine) — this module only performs the raw insert/delete and the
//! batched hydration reads, plus a plain adjacency read used by the
//! in-memory BFS reachability check.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Insert an edge idempotently. Duplicate inserts are a no-op (same
/// semantics as the teacher's `ON CONFLICT DO NOTHING` dependency edges).
pub async fn insert_dependency(
    pool: &SqlitePool,
    blocker_id: &str,
    blocked_id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO task_dependencies (blocker_id, blocked_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT DO NOTHING",
    )
    .bind(blocker_id)
    .bind(blocked_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_dependency(
    pool: &SqlitePool,
    blocker_id: &str,
    blocked_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM task_dependencies WHERE blocker_id = ? AND blocked_id = ?",
    )
    .bind(blocker_id)
    .bind(blocked_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Ids of tasks that `blocker_id` directly blocks. Used as the adjacency
/// step of the reachability BFS during cycle checks.
pub async fn get_blocked_ids(pool: &SqlitePool, blocker_id: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT blocked_id FROM task_dependencies WHERE blocker_id = ?")
            .bind(blocker_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Batched "blockedBy" hydration: for each of `blocked_ids`, the list of
/// task ids that block it. A single round trip regardless of N.
pub async fn get_blockers_batch(
    pool: &SqlitePool,
    blocked_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, sqlx::Error> {
    if blocked_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(blocked_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "SELECT blocked_id, blocker_id FROM task_dependencies WHERE blocked_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, (String, String)>(&query);
    for id in blocked_ids {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (blocked_id, blocker_id) in rows {
        out.entry(blocked_id).or_default().push(blocker_id);
    }
    Ok(out)
}

/// Batched "blocks" hydration: for each of `blocker_ids`, the list of task
/// ids it blocks.
pub async fn get_blocks_batch(
    pool: &SqlitePool,
    blocker_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, sqlx::Error> {
    if blocker_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(blocker_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "SELECT blocker_id, blocked_id FROM task_dependencies WHERE blocker_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, (String, String)>(&query);
    for id in blocker_ids {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (blocker_id, blocked_id) in rows {
        out.entry(blocker_id).or_default().push(blocked_id);
    }
    Ok(out)
}

/// `true` if every row in `blocker_ids` currently has status `done`. Used by
/// the readiness predicate and the reconciler's stale-status pass.
pub async fn all_blockers_done(pool: &SqlitePool, blocked_id: &str) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM task_dependencies td \
         JOIN tasks dep ON dep.id = td.blocker_id \
         WHERE td.blocked_id = ? AND dep.status != 'done'",
    )
    .bind(blocked_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0 == 0)
}

pub async fn delete_dependencies_for_tasks(
    pool: &SqlitePool,
    task_ids: &[String],
) -> Result<u64, sqlx::Error> {
    if task_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = std::iter::repeat("?")
        .take(task_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "DELETE FROM task_dependencies WHERE blocker_id IN ({placeholders}) OR blocked_id IN ({placeholders})"
    );
    let mut q = sqlx::query(&query);
    for id in task_ids {
        q = q.bind(id);
    }
    for id in task_ids {
        q = q.bind(id);
    }
    let result = q.execute(pool).await?;
    Ok(result.rows_affected())
}
