//! Worker registration and liveness.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use sysinfo::{Pid, System};

use tx_db::models::Worker;
use tx_db::queries::workers as db;

use crate::errors::{Error, Result};
use crate::ids;

pub struct RegisterInput<'a> {
    pub name: &'a str,
    pub hostname: &'a str,
    pub pid: i64,
    pub capabilities: &'a str,
}

pub async fn register(pool: &SqlitePool, input: RegisterInput<'_>) -> Result<Worker> {
    if input.name.trim().is_empty() {
        return Err(Error::RegistrationError("worker name must not be empty".into()));
    }
    let id = ids::worker_id();
    let new_worker = db::NewWorker {
        id: &id,
        name: input.name,
        hostname: input.hostname,
        pid: input.pid,
        capabilities: input.capabilities,
        now: Utc::now(),
    };
    Ok(db::insert_worker(pool, &new_worker).await?)
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Worker> {
    db::get_worker(pool, id)
        .await?
        .ok_or_else(|| Error::WorkerNotFound(id.to_string()))
}

pub async fn heartbeat(pool: &SqlitePool, id: &str) -> Result<()> {
    let rows = db::heartbeat(pool, id, Utc::now()).await?;
    if rows == 0 {
        return Err(Error::WorkerNotFound(id.to_string()));
    }
    Ok(())
}

/// Whether a pid is live on this host. `sysinfo` is the process-table
/// source shared with the run reaper's process-tree enumeration.
fn pid_is_alive(sys: &System, pid: i64) -> bool {
    pid.try_into()
        .ok()
        .map(Pid::from_u32)
        .is_some_and(|pid| sys.process(pid).is_some())
}

/// Workers whose heartbeat is older than the cutoff AND whose OS process is
/// not alive. The liveness probe is a refinement on top of the age
/// threshold, never a substitute for it.
pub async fn find_dead(pool: &SqlitePool, heartbeat_age_seconds: i64) -> Result<Vec<Worker>> {
    let cutoff = Utc::now() - Duration::seconds(heartbeat_age_seconds);
    let stale = db::find_stale(pool, cutoff).await?;

    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    Ok(stale
        .into_iter()
        .filter(|w| !pid_is_alive(&sys, w.pid))
        .collect())
}

pub async fn set_offline(pool: &SqlitePool, id: &str) -> Result<()> {
    db::set_status(pool, id, tx_db::models::WorkerStatus::Offline).await?;
    Ok(())
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Worker>> {
    Ok(db::list_workers(pool).await?)
}
