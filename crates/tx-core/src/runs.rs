//! Run + RunHeartbeat: the external-agent-process lifecycle, and the
//! reaper that terminates stalled ones.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sysinfo::{Pid, Signal, System};
use tracing::{info, warn};

use tx_db::models::{Run, RunStatus};
use tx_db::queries::{claims as claim_db, runs as db, tasks as task_db};

use crate::errors::Result;
use crate::ids;

pub struct NewRunInput<'a> {
    pub task_id: Option<&'a str>,
    pub agent: &'a str,
    pub pid: Option<i64>,
    pub transcript_path: Option<&'a str>,
    pub stderr_path: Option<&'a str>,
    pub stdout_path: Option<&'a str>,
    pub metadata: &'a str,
}

pub async fn start(pool: &SqlitePool, input: NewRunInput<'_>) -> Result<Run> {
    let id = ids::run_id();
    let new_run = db::NewRun {
        id: &id,
        task_id: input.task_id,
        agent: input.agent,
        pid: input.pid,
        started_at: Utc::now(),
        transcript_path: input.transcript_path,
        stderr_path: input.stderr_path,
        stdout_path: input.stdout_path,
        metadata: input.metadata,
    };
    Ok(db::insert_run(pool, &new_run).await?)
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Run> {
    db::get_run(pool, id)
        .await?
        .ok_or_else(|| crate::errors::Error::RunNotFound(id.to_string()))
}

pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Run>> {
    Ok(db::list_recent(pool, limit).await?)
}

pub async fn finish(
    pool: &SqlitePool,
    id: &str,
    status: RunStatus,
    exit_code: Option<i64>,
    error_message: Option<&str>,
) -> Result<()> {
    db::finish_run(pool, id, status, exit_code, Utc::now(), error_message).await?;
    Ok(())
}

pub struct HeartbeatInput {
    pub stdout_bytes: i64,
    pub stderr_bytes: i64,
    pub transcript_bytes: i64,
    /// Caller-supplied activity timestamp; if omitted, "now" is used only
    /// when a byte counter increased (delta > 0).
    pub activity_at: Option<DateTime<Utc>>,
}

/// Upserts heartbeat state. `last_activity_at` only advances when a byte
/// counter increased or the caller supplies a newer `activity_at`.
pub async fn heartbeat(pool: &SqlitePool, run_id: &str, input: HeartbeatInput) -> Result<()> {
    let now = Utc::now();
    let previous = db::get_heartbeat(pool, run_id).await?;

    let delta = previous.as_ref().map_or(
        input.stdout_bytes + input.stderr_bytes + input.transcript_bytes,
        |p| {
            (input.stdout_bytes - p.stdout_bytes)
                + (input.stderr_bytes - p.stderr_bytes)
                + (input.transcript_bytes - p.transcript_bytes)
        },
    );

    let last_activity_at = match (input.activity_at, &previous) {
        (Some(supplied), Some(p)) if supplied > p.last_activity_at => supplied,
        (Some(supplied), None) => supplied,
        (_, Some(p)) if delta > 0 => now,
        (_, Some(p)) => p.last_activity_at,
        (_, None) => now,
    };

    db::upsert_heartbeat(
        pool,
        run_id,
        now,
        last_activity_at,
        input.stdout_bytes,
        input.stderr_bytes,
        input.transcript_bytes,
        delta,
    )
    .await?;
    Ok(())
}

pub struct StalledRun {
    pub run: Run,
    pub reason: &'static str,
}

pub async fn list_stalled(
    pool: &SqlitePool,
    transcript_idle_seconds: i64,
    heartbeat_lag_seconds: Option<i64>,
) -> Result<Vec<StalledRun>> {
    let rows = db::list_stalled(pool, Utc::now(), transcript_idle_seconds, heartbeat_lag_seconds).await?;
    Ok(rows
        .into_iter()
        .map(|(run, reason)| StalledRun { run, reason })
        .collect())
}

pub struct ReapOptions {
    pub transcript_idle_seconds: i64,
    pub heartbeat_lag_seconds: Option<i64>,
    pub reset_task: bool,
    pub dry_run: bool,
}

impl Default for ReapOptions {
    fn default() -> Self {
        Self {
            transcript_idle_seconds: 300,
            heartbeat_lag_seconds: None,
            reset_task: true,
            dry_run: false,
        }
    }
}

pub struct ReapedRun {
    pub run_id: String,
    pub reason: &'static str,
    pub process_killed: bool,
}

/// Exit code conventionally assigned to a process killed by SIGKILL
/// (128 + signal 9), matching what a shell would report.
const REAPED_EXIT_CODE: i64 = 137;

/// Enumerate every live descendant of `root_pid` (including itself),
/// via a parent-pid index over the full process snapshot.
fn descendant_pids(sys: &System, root_pid: i64) -> Vec<Pid> {
    let Ok(root) = u32::try_from(root_pid) else {
        return Vec::new();
    };
    let root = Pid::from_u32(root);
    if sys.process(root).is_none() {
        return Vec::new();
    }

    let mut children_of: std::collections::HashMap<Pid, Vec<Pid>> = std::collections::HashMap::new();
    for (pid, process) in sys.processes() {
        if let Some(parent) = process.parent() {
            children_of.entry(parent).or_default().push(*pid);
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![root];
    while let Some(pid) = frontier.pop() {
        if !seen.insert(pid) {
            continue;
        }
        out.push(pid);
        if let Some(children) = children_of.get(&pid) {
            frontier.extend(children.iter().copied());
        }
    }
    out
}

/// Terminate a process tree: SIGTERM to every descendant, a 2s grace
/// period, then SIGKILL to whatever survives.
async fn kill_process_tree(pid: i64) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let pids = descendant_pids(&sys, pid);
    if pids.is_empty() {
        return false;
    }

    for pid in &pids {
        if let Some(process) = sys.process(*pid) {
            process.kill_with(Signal::Term);
        }
    }

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    for pid in &pids {
        if let Some(process) = sys.process(*pid) {
            process.kill_with(Signal::Kill);
        }
    }

    true
}

/// Terminate every stalled run's process tree, mark it cancelled, expire
/// its claim, and optionally reset its task back to `ready`.
pub async fn reap_stalled(pool: &SqlitePool, options: ReapOptions) -> Result<Vec<ReapedRun>> {
    let stalled = list_stalled(pool, options.transcript_idle_seconds, options.heartbeat_lag_seconds).await?;
    let mut reaped = Vec::with_capacity(stalled.len());

    for StalledRun { run, reason } in stalled {
        let process_killed = if !options.dry_run {
            match run.pid {
                Some(pid) => kill_process_tree(pid).await,
                None => false,
            }
        } else {
            false
        };

        if !options.dry_run {
            let message = format!("reaped: {reason}");
            db::finish_run(pool, &run.id, RunStatus::Cancelled, Some(REAPED_EXIT_CODE), Utc::now(), Some(&message))
                .await?;

            if let Some(task_id) = &run.task_id {
                if let Some(active_claim) = claim_db::get_active_claim(pool, task_id).await? {
                    claim_db::expire(pool, active_claim.id).await?;
                }
                if options.reset_task {
                    let now = Utc::now();
                    task_db::force_status(pool, task_id, tx_db::models::TaskStatus::Ready, now, None).await?;
                }
            }

            info!(run_id = %run.id, reason, process_killed, "reaped stalled run");
        } else {
            warn!(run_id = %run.id, reason, "dry-run: would reap stalled run");
        }

        reaped.push(ReapedRun {
            run_id: run.id,
            reason,
            process_killed,
        });
    }

    Ok(reaped)
}
