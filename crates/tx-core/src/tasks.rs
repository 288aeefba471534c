//! Task engine: creation, validated transitions, dependency hydration, and
//! cascade removal.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use tx_db::models::{Task, TaskStatus};
use tx_db::queries::{dependencies as dep_db, tasks as db};

use crate::errors::{task_not_found, Error, Result};
use crate::ids;

/// Task plus hydrated dependency edges, the REQUIRED external shape for
/// every task-returning operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithDeps {
    #[serde(flatten)]
    pub task: Task,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub children: Vec<String>,
    pub is_ready: bool,
}

fn is_ready(status: TaskStatus, blockers_done: bool) -> bool {
    matches!(
        status,
        TaskStatus::Backlog | TaskStatus::Ready | TaskStatus::Planning
    ) && blockers_done
}

/// The from -> to transition matrix from the task lifecycle table.
/// `Backlog -> Backlog`-style no-ops are not in the table and are
/// rejected like any other illegal pair.
fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Backlog, Ready)
            | (Backlog, Planning)
            | (Backlog, Cancelled)
            | (Planning, Ready)
            | (Planning, Active)
            | (Planning, Blocked)
            | (Planning, Failed)
            | (Planning, Cancelled)
            | (Planning, Backlog)
            | (Ready, Planning)
            | (Ready, Active)
            | (Ready, Blocked)
            | (Ready, Failed)
            | (Ready, Cancelled)
            | (Ready, Backlog)
            | (Active, Blocked)
            | (Active, Done)
            | (Active, Failed)
            | (Active, Cancelled)
            | (Active, Backlog)
            | (Blocked, Ready)
            | (Blocked, Planning)
            | (Blocked, Active)
            | (Blocked, Failed)
            | (Blocked, Cancelled)
            | (Blocked, Backlog)
            | (Done, Backlog)
            | (Failed, Ready)
            | (Failed, Planning)
            | (Failed, Active)
            | (Failed, Cancelled)
            | (Failed, Backlog)
            | (Cancelled, Ready)
            | (Cancelled, Planning)
            | (Cancelled, Backlog)
    )
}

pub struct NewTaskInput<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub score: i64,
    pub metadata: &'a str,
}

pub async fn create(pool: &SqlitePool, input: NewTaskInput<'_>) -> Result<Task> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(Error::ValidationError("title must not be empty".into()));
    }
    if let Some(parent_id) = input.parent_id {
        if db::get_task(pool, parent_id).await?.is_none() {
            return Err(task_not_found(parent_id));
        }
    }

    let id = ids::task_id();
    let now = Utc::now();
    let new_task = db::NewTask {
        id: &id,
        title,
        description: input.description,
        parent_id: input.parent_id,
        score: input.score,
        metadata: input.metadata,
        now,
    };
    Ok(db::insert_task(pool, &new_task).await?)
}

#[derive(Debug, Default)]
pub struct TaskUpdate<'a> {
    pub title: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub parent_id: Option<Option<&'a str>>,
    pub score: Option<i64>,
    pub status: Option<TaskStatus>,
}

pub async fn update(pool: &SqlitePool, id: &str, update: TaskUpdate<'_>) -> Result<Task> {
    let current = db::get_task(pool, id).await?.ok_or_else(|| task_not_found(id))?;
    let now = Utc::now();

    if let Some(to) = update.status {
        if !is_valid_transition(current.status, to) {
            return Err(Error::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }
        let completed_at = match (current.status, to) {
            (_, TaskStatus::Done) => Some(Some(now)),
            (TaskStatus::Done, _) => Some(None),
            _ => None,
        };
        let rows = db::transition_status(pool, id, current.status, to, now, completed_at).await?;
        if rows == 0 {
            return Err(Error::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }
    }

    let field_update = db::TaskFieldUpdate {
        title: update.title,
        description: update.description,
        parent_id: update.parent_id,
        score: update.score,
    };
    db::update_task_fields(pool, id, &field_update, now)
        .await?
        .ok_or_else(|| task_not_found(id))
}

/// Bypasses the transition matrix. Reconciler-only.
pub async fn force_status(pool: &SqlitePool, id: &str, to: TaskStatus) -> Result<()> {
    let current = db::get_task(pool, id).await?.ok_or_else(|| task_not_found(id))?;
    let now = Utc::now();
    let completed_at = match (current.status, to) {
        (_, TaskStatus::Done) => Some(Some(now)),
        (TaskStatus::Done, _) => Some(None),
        _ => None,
    };
    db::force_status(pool, id, to, now, completed_at).await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Task> {
    db::get_task(pool, id).await?.ok_or_else(|| task_not_found(id))
}

async fn hydrate(pool: &SqlitePool, task: Task) -> Result<TaskWithDeps> {
    let blocked_by = dep_db::get_blockers_batch(pool, &[task.id.clone()])
        .await?
        .remove(&task.id)
        .unwrap_or_default();
    let blocks = dep_db::get_blocks_batch(pool, &[task.id.clone()])
        .await?
        .remove(&task.id)
        .unwrap_or_default();
    let children = db::get_children(pool, &task.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let blockers_done = dep_db::all_blockers_done(pool, &task.id).await?;
    let ready = is_ready(task.status, blockers_done);

    Ok(TaskWithDeps {
        is_ready: ready,
        blocked_by,
        blocks,
        children,
        task,
    })
}

pub async fn get_with_deps(pool: &SqlitePool, id: &str) -> Result<TaskWithDeps> {
    let task = get(pool, id).await?;
    hydrate(pool, task).await
}

/// Batched hydration: blocker/blocks lists are fetched once for the whole
/// batch (O(1) round trips), not per task.
pub async fn get_with_deps_batch(pool: &SqlitePool, ids: &[String]) -> Result<Vec<TaskWithDeps>> {
    let tasks = db::get_tasks_batch(pool, ids).await?;
    if tasks.is_empty() {
        return Ok(Vec::new());
    }
    let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut blocked_by_map = dep_db::get_blockers_batch(pool, &task_ids).await?;
    let mut blocks_map = dep_db::get_blocks_batch(pool, &task_ids).await?;

    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        let blocked_by = blocked_by_map.remove(&task.id).unwrap_or_default();
        let blocks = blocks_map.remove(&task.id).unwrap_or_default();
        let children = db::get_children(pool, &task.id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let blockers_done = dep_db::all_blockers_done(pool, &task.id).await?;
        let ready = is_ready(task.status, blockers_done);
        out.push(TaskWithDeps {
            is_ready: ready,
            blocked_by,
            blocks,
            children,
            task,
        });
    }
    Ok(out)
}

#[derive(Debug, Default)]
pub struct ListFilter {
    pub statuses: Vec<TaskStatus>,
    pub limit: Option<i64>,
}

/// Status filter matches the FULL set of given statuses, not just the
/// first element.
pub async fn list_with_deps(pool: &SqlitePool, filter: ListFilter) -> Result<Vec<TaskWithDeps>> {
    let tasks = db::list_tasks(pool, &filter.statuses, filter.limit).await?;
    let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    get_with_deps_batch(pool, &ids).await
}

/// `cascade=true` also deletes every descendant task plus all dependency
/// rows referencing the removed set, atomically.
pub async fn remove(pool: &SqlitePool, id: &str, cascade: bool) -> Result<()> {
    if db::get_task(pool, id).await?.is_none() {
        return Err(task_not_found(id));
    }

    let mut tx = pool.begin().await?;
    let ids_to_delete: Vec<String> = if cascade {
        sqlx::query_as::<_, (String,)>(
            "WITH RECURSIVE subtree(id) AS ( \
                 SELECT ? \
                 UNION ALL \
                 SELECT tasks.id FROM tasks JOIN subtree ON tasks.parent_id = subtree.id \
             ) \
             SELECT id FROM subtree",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect()
    } else {
        vec![id.to_string()]
    };

    for task_id in &ids_to_delete {
        sqlx::query("DELETE FROM task_dependencies WHERE blocker_id = ? OR blocked_id = ?")
            .bind(task_id)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Builds blocked-id -> blocker-id-list and blocker-id -> blocked-id-list
/// maps for a set of tasks, used by callers that want the raw adjacency
/// rather than full `TaskWithDeps` hydration (e.g. the reconciler).
pub async fn dependency_maps(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<(HashMap<String, Vec<String>>, HashMap<String, Vec<String>>)> {
    let blocked_by = dep_db::get_blockers_batch(pool, ids).await?;
    let blocks = dep_db::get_blocks_batch(pool, ids).await?;
    Ok((blocked_by, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_matches_spec_table() {
        use TaskStatus::*;
        assert!(is_valid_transition(Backlog, Ready));
        assert!(is_valid_transition(Backlog, Planning));
        assert!(!is_valid_transition(Backlog, Active));
        assert!(is_valid_transition(Active, Done));
        assert!(!is_valid_transition(Done, Ready));
        assert!(!is_valid_transition(Done, Cancelled));
        assert!(is_valid_transition(Done, Backlog));
        assert!(is_valid_transition(Cancelled, Backlog));
        assert!(!is_valid_transition(Cancelled, Active));
    }

    #[test]
    fn readiness_requires_eligible_status_and_clear_blockers() {
        assert!(is_ready(TaskStatus::Backlog, true));
        assert!(!is_ready(TaskStatus::Backlog, false));
        assert!(!is_ready(TaskStatus::Active, true));
        assert!(is_ready(TaskStatus::Ready, true));
    }
}
