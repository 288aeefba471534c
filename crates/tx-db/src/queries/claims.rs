use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::Claim;

/// Insert an active claim row. The partial unique index
/// `idx_claims_one_active_per_task` enforces "at most one active claim per
/// task" at the database level: a second concurrent insert for the same
/// task fails with a unique-constraint violation, which the caller maps to
/// `AlreadyClaimed`.
pub async fn insert_claim(
    pool: &SqlitePool,
    task_id: &str,
    worker_id: &str,
    claimed_at: DateTime<Utc>,
    lease_expires_at: DateTime<Utc>,
) -> Result<Claim, sqlx::Error> {
    sqlx::query_as::<_, Claim>(
        "INSERT INTO claims (task_id, worker_id, status, claimed_at, lease_expires_at, renewed_count) \
         VALUES (?, ?, 'active', ?, ?, 0) \
         RETURNING *",
    )
    .bind(task_id)
    .bind(worker_id)
    .bind(claimed_at)
    .bind(lease_expires_at)
    .fetch_one(pool)
    .await
}

pub async fn get_active_claim(pool: &SqlitePool, task_id: &str) -> Result<Option<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE task_id = ? AND status = 'active'")
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_claim(pool: &SqlitePool, id: i64) -> Result<Option<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>("SELECT * FROM claims WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn renew(
    pool: &SqlitePool,
    claim_id: i64,
    lease_expires_at: DateTime<Utc>,
) -> Result<Option<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>(
        "UPDATE claims SET lease_expires_at = ?, renewed_count = renewed_count + 1 \
         WHERE id = ? AND status = 'active' \
         RETURNING *",
    )
    .bind(lease_expires_at)
    .bind(claim_id)
    .fetch_optional(pool)
    .await
}

pub async fn release(pool: &SqlitePool, task_id: &str, worker_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE claims SET status = 'released' \
         WHERE task_id = ? AND worker_id = ? AND status = 'active'",
    )
    .bind(task_id)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Idempotent: a claim already expired (or released) matches zero rows and
/// the caller treats that as success, not `ClaimIdNotFound` (that tag is
/// reserved for a claim id that never existed at all).
pub async fn expire(pool: &SqlitePool, claim_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE claims SET status = 'expired' WHERE id = ? AND status = 'active'")
        .bind(claim_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Claim>, sqlx::Error> {
    sqlx::query_as::<_, Claim>(
        "SELECT * FROM claims WHERE status = 'active' AND lease_expires_at < ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn release_by_worker(pool: &SqlitePool, worker_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE claims SET status = 'released' WHERE worker_id = ? AND status = 'active'")
        .bind(worker_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// All active claims owned by any of the given workers (used by the
/// reconciler to count `expiredClaimsReleased` from dead-worker release).
pub async fn get_active_claims_for_workers(
    pool: &SqlitePool,
    worker_ids: &[String],
) -> Result<Vec<Claim>, sqlx::Error> {
    if worker_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(worker_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "SELECT * FROM claims WHERE status = 'active' AND worker_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, Claim>(&query);
    for id in worker_ids {
        q = q.bind(id);
    }
    q.fetch_all(pool).await
}
