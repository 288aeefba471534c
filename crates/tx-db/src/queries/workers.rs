use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Worker, WorkerStatus};

pub struct NewWorker<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub hostname: &'a str,
    pub pid: i64,
    pub capabilities: &'a str,
    pub now: DateTime<Utc>,
}

pub async fn insert_worker(pool: &SqlitePool, new_worker: &NewWorker<'_>) -> Result<Worker, sqlx::Error> {
    sqlx::query_as::<_, Worker>(
        "INSERT INTO workers (id, name, hostname, pid, status, registered_at, last_heartbeat_at, capabilities) \
         VALUES (?, ?, ?, ?, 'idle', ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_worker.id)
    .bind(new_worker.name)
    .bind(new_worker.hostname)
    .bind(new_worker.pid)
    .bind(new_worker.now)
    .bind(new_worker.now)
    .bind(new_worker.capabilities)
    .fetch_one(pool)
    .await
}

pub async fn get_worker(pool: &SqlitePool, id: &str) -> Result<Option<Worker>, sqlx::Error> {
    sqlx::query_as::<_, Worker>("SELECT * FROM workers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn heartbeat(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE workers SET last_heartbeat_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_status(
    pool: &SqlitePool,
    id: &str,
    status: WorkerStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE workers SET status = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Workers whose last heartbeat is older than `cutoff` and are not already
/// marked offline.
pub async fn find_stale(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Worker>, sqlx::Error> {
    sqlx::query_as::<_, Worker>(
        "SELECT * FROM workers WHERE last_heartbeat_at < ? AND status != 'offline'",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

pub async fn list_workers(pool: &SqlitePool) -> Result<Vec<Worker>, sqlx::Error> {
    sqlx::query_as::<_, Worker>("SELECT * FROM workers ORDER BY registered_at ASC")
        .fetch_all(pool)
        .await
}
