//! Claim service: the lease manager over tasks.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use tx_db::models::Claim;
use tx_db::queries::{claims as db, tasks as task_db, workers as worker_db};

use crate::errors::{task_not_found, Error, Result};

pub const DEFAULT_LEASE_MINUTES: i64 = 30;
pub const MAX_RENEWALS: i64 = 10;

pub async fn claim(
    pool: &SqlitePool,
    task_id: &str,
    worker_id: &str,
    lease_minutes: Option<i64>,
) -> Result<Claim> {
    if task_db::get_task(pool, task_id).await?.is_none() {
        return Err(task_not_found(task_id));
    }
    if worker_db::get_worker(pool, worker_id).await?.is_none() {
        return Err(Error::WorkerNotFound(worker_id.to_string()));
    }

    let now = Utc::now();
    let lease_expires_at = now + Duration::minutes(lease_minutes.unwrap_or(DEFAULT_LEASE_MINUTES));

    match db::insert_claim(pool, task_id, worker_id, now, lease_expires_at).await {
        Ok(claim) => Ok(claim),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let existing = db::get_active_claim(pool, task_id)
                .await?
                .ok_or_else(|| Error::ClaimNotFound(task_id.to_string()))?;
            Err(Error::AlreadyClaimed {
                task_id: task_id.to_string(),
                claimed_by_worker_id: existing.worker_id,
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn renew(pool: &SqlitePool, task_id: &str, worker_id: &str, lease_minutes: Option<i64>) -> Result<Claim> {
    let existing = db::get_active_claim(pool, task_id)
        .await?
        .filter(|c| c.worker_id == worker_id)
        .ok_or_else(|| Error::ClaimNotFound(task_id.to_string()))?;

    let now = Utc::now();
    if now > existing.lease_expires_at {
        return Err(Error::LeaseExpired(existing.id));
    }
    if existing.renewed_count >= MAX_RENEWALS {
        return Err(Error::MaxRenewalsExceeded(existing.id));
    }

    let lease_expires_at = now + Duration::minutes(lease_minutes.unwrap_or(DEFAULT_LEASE_MINUTES));
    db::renew(pool, existing.id, lease_expires_at)
        .await?
        .ok_or_else(|| Error::ClaimNotFound(task_id.to_string()))
}

pub async fn release(pool: &SqlitePool, task_id: &str, worker_id: &str) -> Result<()> {
    let rows = db::release(pool, task_id, worker_id).await?;
    if rows == 0 {
        return Err(Error::ClaimNotFound(task_id.to_string()));
    }
    Ok(())
}

/// Idempotent: a claim already expired or released matches zero rows and
/// that is treated as success. `ClaimIdNotFound` is reserved for a claim
/// id that never existed.
pub async fn expire(pool: &SqlitePool, claim_id: i64) -> Result<()> {
    if db::get_claim(pool, claim_id).await?.is_none() {
        return Err(Error::ClaimIdNotFound(claim_id));
    }
    db::expire(pool, claim_id).await?;
    Ok(())
}

pub async fn get_expired(pool: &SqlitePool) -> Result<Vec<Claim>> {
    Ok(db::get_expired(pool, Utc::now()).await?)
}

pub async fn release_by_worker(pool: &SqlitePool, worker_id: &str) -> Result<u64> {
    Ok(db::release_by_worker(pool, worker_id).await?)
}

pub async fn get_active_claim(pool: &SqlitePool, task_id: &str) -> Result<Option<Claim>> {
    Ok(db::get_active_claim(pool, task_id).await?)
}
