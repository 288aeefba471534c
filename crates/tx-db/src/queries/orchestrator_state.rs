use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{OrchestratorState, OrchestratorStatus};

pub async fn get(pool: &SqlitePool) -> Result<OrchestratorState, sqlx::Error> {
    sqlx::query_as::<_, OrchestratorState>("SELECT * FROM orchestrator_state WHERE id = 1")
        .fetch_one(pool)
        .await
}

/// Compare-and-swap the singleton's status. Returns the number of rows
/// affected (0 means `from` no longer matched — a concurrent `start()`).
pub async fn cas_status(
    pool: &SqlitePool,
    from: OrchestratorStatus,
    to: OrchestratorStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE orchestrator_state SET status = ? WHERE id = 1 AND status = ?")
        .bind(to.to_string())
        .bind(from.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub struct StartParams {
    pub pid: i64,
    pub started_at: DateTime<Utc>,
    pub worker_pool_size: i64,
    pub heartbeat_interval_seconds: i64,
    pub lease_duration_minutes: i64,
    pub reconcile_interval_seconds: i64,
}

pub async fn record_start(pool: &SqlitePool, params: &StartParams) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orchestrator_state SET \
           status = 'running', pid = ?, started_at = ?, \
           worker_pool_size = ?, heartbeat_interval_seconds = ?, \
           lease_duration_minutes = ?, reconcile_interval_seconds = ? \
         WHERE id = 1",
    )
    .bind(params.pid)
    .bind(params.started_at)
    .bind(params.worker_pool_size)
    .bind(params.heartbeat_interval_seconds)
    .bind(params.lease_duration_minutes)
    .bind(params.reconcile_interval_seconds)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn record_stop(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orchestrator_state SET status = 'stopped', pid = NULL WHERE id = 1",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn stamp_reconcile(pool: &SqlitePool, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orchestrator_state SET last_reconcile_at = ? WHERE id = 1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}
