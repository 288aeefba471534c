//! Task row CRUD. Transition validation lives in `tx-core`; this module only
//! performs the optimistic-locked UPDATE and disambiguates "not found" from
//! "status changed under us" by re-fetching on a zero-row update.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Task, TaskStatus};

pub struct NewTask<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub score: i64,
    pub metadata: &'a str,
    pub now: DateTime<Utc>,
}

pub async fn insert_task(pool: &SqlitePool, new_task: &NewTask<'_>) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (id, title, description, status, parent_id, score, metadata, created_at, updated_at) \
         VALUES (?, ?, ?, 'backlog', ?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_task.id)
    .bind(new_task.title)
    .bind(new_task.description)
    .bind(new_task.parent_id)
    .bind(new_task.score)
    .bind(new_task.metadata)
    .bind(new_task.now)
    .bind(new_task.now)
    .fetch_one(pool)
    .await
}

pub async fn get_task(pool: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_tasks_batch(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Task>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!("SELECT * FROM tasks WHERE id IN ({placeholders})");
    let mut q = sqlx::query_as::<_, Task>(&query);
    for id in ids {
        q = q.bind(id);
    }
    q.fetch_all(pool).await
}

/// List tasks filtered by a set of statuses (empty set = no filter) and an
/// optional limit. The full set is matched, never just its first element.
pub async fn list_tasks(
    pool: &SqlitePool,
    statuses: &[TaskStatus],
    limit: Option<i64>,
) -> Result<Vec<Task>, sqlx::Error> {
    if statuses.is_empty() {
        let query = match limit {
            Some(n) => sqlx::query_as::<_, Task>(
                "SELECT * FROM tasks ORDER BY created_at ASC LIMIT ?",
            )
            .bind(n),
            None => sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at ASC"),
        };
        return query.fetch_all(pool).await;
    }

    let placeholders = std::iter::repeat("?")
        .take(statuses.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = match limit {
        Some(_) => format!(
            "SELECT * FROM tasks WHERE status IN ({placeholders}) ORDER BY created_at ASC LIMIT ?"
        ),
        None => format!(
            "SELECT * FROM tasks WHERE status IN ({placeholders}) ORDER BY created_at ASC"
        ),
    };
    let mut q = sqlx::query_as::<_, Task>(&sql);
    for status in statuses {
        q = q.bind(status.to_string());
    }
    if let Some(n) = limit {
        q = q.bind(n);
    }
    q.fetch_all(pool).await
}

pub struct TaskFieldUpdate<'a> {
    pub title: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub parent_id: Option<Option<&'a str>>,
    pub score: Option<i64>,
}

/// Update non-status fields (title/description/parentId/score). Status
/// changes always go through `transition_status`/`force_status`.
pub async fn update_task_fields(
    pool: &SqlitePool,
    id: &str,
    update: &TaskFieldUpdate<'_>,
    now: DateTime<Utc>,
) -> Result<Option<Task>, sqlx::Error> {
    let Some(mut task) = get_task(pool, id).await? else {
        return Ok(None);
    };

    if let Some(title) = update.title {
        task.title = title.to_string();
    }
    if let Some(description) = update.description {
        task.description = description.map(str::to_string);
    }
    if let Some(parent_id) = update.parent_id {
        task.parent_id = parent_id.map(str::to_string);
    }
    if let Some(score) = update.score {
        task.score = score;
    }

    sqlx::query_as::<_, Task>(
        "UPDATE tasks SET title = ?, description = ?, parent_id = ?, score = ?, updated_at = ? \
         WHERE id = ? \
         RETURNING *",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.parent_id)
    .bind(task.score)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Optimistic-locked status transition: succeeds only if the row's current
/// status still matches `from`. Returns `Ok(None)` when the row does not
/// exist at all so the caller can distinguish "not found" from "status
/// changed under us" (callers re-fetch on a zero-row update already knowing
/// the row exists, since `get_task` was called first to validate the
/// transition matrix).
pub async fn transition_status(
    pool: &SqlitePool,
    id: &str,
    from: TaskStatus,
    to: TaskStatus,
    now: DateTime<Utc>,
    completed_at: Option<Option<DateTime<Utc>>>,
) -> Result<u64, sqlx::Error> {
    let result = match completed_at {
        Some(value) => {
            sqlx::query(
                "UPDATE tasks SET status = ?, updated_at = ?, completed_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(to.to_string())
            .bind(now)
            .bind(value)
            .bind(id)
            .bind(from.to_string())
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE tasks SET status = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(to.to_string())
            .bind(now)
            .bind(id)
            .bind(from.to_string())
            .execute(pool)
            .await?
        }
    };
    Ok(result.rows_affected())
}

/// Bypass the transition matrix entirely. Used only by the reconciler.
pub async fn force_status(
    pool: &SqlitePool,
    id: &str,
    to: TaskStatus,
    now: DateTime<Utc>,
    completed_at: Option<Option<DateTime<Utc>>>,
) -> Result<u64, sqlx::Error> {
    let result = match completed_at {
        Some(value) => {
            sqlx::query("UPDATE tasks SET status = ?, updated_at = ?, completed_at = ? WHERE id = ?")
                .bind(to.to_string())
                .bind(now)
                .bind(value)
                .bind(id)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
                .bind(to.to_string())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected())
}

pub async fn delete_task(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_children(pool: &SqlitePool, parent_id: &str) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE parent_id = ? ORDER BY created_at ASC")
        .bind(parent_id)
        .fetch_all(pool)
        .await
}

/// Recursively collect a task and every descendant id (for cascade delete).
pub async fn get_subtree_ids(pool: &SqlitePool, root_id: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "WITH RECURSIVE subtree(id) AS ( \
             SELECT ? \
             UNION ALL \
             SELECT tasks.id FROM tasks JOIN subtree ON tasks.parent_id = subtree.id \
         ) \
         SELECT id FROM subtree",
    )
    .bind(root_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
