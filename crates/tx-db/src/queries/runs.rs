use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Run, RunHeartbeat, RunStatus};

pub struct NewRun<'a> {
    pub id: &'a str,
    pub task_id: Option<&'a str>,
    pub agent: &'a str,
    pub pid: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub transcript_path: Option<&'a str>,
    pub stderr_path: Option<&'a str>,
    pub stdout_path: Option<&'a str>,
    pub metadata: &'a str,
}

pub async fn insert_run(pool: &SqlitePool, new_run: &NewRun<'_>) -> Result<Run, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        "INSERT INTO runs (id, task_id, agent, status, pid, started_at, transcript_path, stderr_path, stdout_path, metadata) \
         VALUES (?, ?, ?, 'running', ?, ?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_run.id)
    .bind(new_run.task_id)
    .bind(new_run.agent)
    .bind(new_run.pid)
    .bind(new_run.started_at)
    .bind(new_run.transcript_path)
    .bind(new_run.stderr_path)
    .bind(new_run.stdout_path)
    .bind(new_run.metadata)
    .fetch_one(pool)
    .await
}

pub async fn get_run(pool: &SqlitePool, id: &str) -> Result<Option<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>("SELECT * FROM runs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>("SELECT * FROM runs ORDER BY started_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn finish_run(
    pool: &SqlitePool,
    id: &str,
    status: RunStatus,
    exit_code: Option<i64>,
    ended_at: DateTime<Utc>,
    error_message: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE runs SET status = ?, exit_code = ?, ended_at = ?, error_message = ? WHERE id = ?",
    )
    .bind(status.to_string())
    .bind(exit_code)
    .bind(ended_at)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn upsert_heartbeat(
    pool: &SqlitePool,
    run_id: &str,
    last_check_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    stdout_bytes: i64,
    stderr_bytes: i64,
    transcript_bytes: i64,
    last_delta_bytes: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO run_heartbeats (run_id, last_check_at, last_activity_at, stdout_bytes, stderr_bytes, transcript_bytes, last_delta_bytes) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(run_id) DO UPDATE SET \
           last_check_at = excluded.last_check_at, \
           last_activity_at = excluded.last_activity_at, \
           stdout_bytes = excluded.stdout_bytes, \
           stderr_bytes = excluded.stderr_bytes, \
           transcript_bytes = excluded.transcript_bytes, \
           last_delta_bytes = excluded.last_delta_bytes",
    )
    .bind(run_id)
    .bind(last_check_at)
    .bind(last_activity_at)
    .bind(stdout_bytes)
    .bind(stderr_bytes)
    .bind(transcript_bytes)
    .bind(last_delta_bytes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_heartbeat(
    pool: &SqlitePool,
    run_id: &str,
) -> Result<Option<RunHeartbeat>, sqlx::Error> {
    sqlx::query_as::<_, RunHeartbeat>("SELECT * FROM run_heartbeats WHERE run_id = ?")
        .bind(run_id)
        .fetch_optional(pool)
        .await
}

/// Running runs whose heartbeat state exceeds either staleness threshold.
/// Returns `(Run, reason)` pairs; `reason` is `"transcript_idle"` or
/// `"heartbeat_stale"`.
pub async fn list_stalled(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    transcript_idle_seconds: i64,
    heartbeat_lag_seconds: Option<i64>,
) -> Result<Vec<(Run, &'static str)>, sqlx::Error> {
    let running = sqlx::query_as::<_, Run>("SELECT * FROM runs WHERE status = 'running'")
        .fetch_all(pool)
        .await?;

    let mut out = Vec::new();
    for run in running {
        let Some(hb) = get_heartbeat(pool, &run.id).await? else {
            continue;
        };

        let idle_secs = (now - hb.last_activity_at).num_seconds();
        if idle_secs >= transcript_idle_seconds {
            out.push((run, "transcript_idle"));
            continue;
        }
        if let Some(lag_threshold) = heartbeat_lag_seconds {
            let lag_secs = (now - hb.last_check_at).num_seconds();
            if lag_secs >= lag_threshold {
                out.push((run, "heartbeat_stale"));
            }
        }
    }
    Ok(out)
}
