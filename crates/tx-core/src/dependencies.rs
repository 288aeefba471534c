//! Dependency engine: cycle-safe edge insertion.
//!
//! `add_blocker` runs entirely inside one write-intent (`BEGIN IMMEDIATE`)
//! SQLite transaction so the reachability check and the insert are
//! serialized against any other writer that could also be adding edges —
//! the two-phase "check then insert outside a transaction" shape is
//! exactly what this avoids.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::errors::{task_not_found, Error, Result};

/// `blocked_id` depends on `blocker_id`: `blocker_id` must reach `done`
/// before `blocked_id` can proceed.
pub async fn add_blocker(pool: &SqlitePool, blocked_id: &str, blocker_id: &str) -> Result<()> {
    if blocked_id == blocker_id {
        return Err(Error::CircularDependency(blocked_id.to_string()));
    }

    let mut tx = pool.begin().await?;

    let blocked_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = ?")
        .bind(blocked_id)
        .fetch_optional(&mut *tx)
        .await?;
    if blocked_exists.is_none() {
        return Err(task_not_found(blocked_id));
    }
    let blocker_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = ?")
        .bind(blocker_id)
        .fetch_optional(&mut *tx)
        .await?;
    if blocker_exists.is_none() {
        return Err(task_not_found(blocker_id));
    }

    // Reachability: would `blocker_id -> blocked_id` close a cycle, i.e.
    // does a path `blocked_id -> ... -> blocker_id` already exist? Walk
    // forward from `blocked_id` along existing "blocks" edges.
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = vec![blocked_id.to_string()];
    visited.insert(blocked_id.to_string());

    while let Some(current) = frontier.pop() {
        let next: Vec<(String,)> =
            sqlx::query_as("SELECT blocked_id FROM task_dependencies WHERE blocker_id = ?")
                .bind(&current)
                .fetch_all(&mut *tx)
                .await?;
        for (next_id,) in next {
            if next_id == blocker_id {
                return Err(Error::CircularDependency(blocker_id.to_string()));
            }
            if visited.insert(next_id.clone()) {
                frontier.push(next_id);
            }
        }
    }

    sqlx::query(
        "INSERT INTO task_dependencies (blocker_id, blocked_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT DO NOTHING",
    )
    .bind(blocker_id)
    .bind(blocked_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn remove_blocker(pool: &SqlitePool, blocked_id: &str, blocker_id: &str) -> Result<()> {
    let rows = sqlx::query("DELETE FROM task_dependencies WHERE blocker_id = ? AND blocked_id = ?")
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(Error::DependencyNotFound {
            blocker_id: blocker_id.to_string(),
            blocked_id: blocked_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tx_test_utils::create_test_db;

    #[tokio::test]
    async fn rejects_self_loop_without_touching_the_database() {
        let db = create_test_db().await;
        let err = add_blocker(&db.pool, "tx-a", "tx-a").await.unwrap_err();
        assert_eq!(err.code(), "CircularDependency");
    }

    #[tokio::test]
    async fn rejects_edge_that_would_close_a_cycle() {
        let db = create_test_db().await;
        let now = Utc::now();
        for id in ["tx-a", "tx-b", "tx-c"] {
            sqlx::query(
                "INSERT INTO tasks (id, title, status, score, metadata, created_at, updated_at) \
                 VALUES (?, ?, 'backlog', 0, '{}', ?, ?)",
            )
            .bind(id)
            .bind(id)
            .bind(now)
            .bind(now)
            .execute(&db.pool)
            .await
            .unwrap();
        }

        // a blocks b, b blocks c.
        add_blocker(&db.pool, "tx-b", "tx-a").await.unwrap();
        add_blocker(&db.pool, "tx-c", "tx-b").await.unwrap();

        // c blocking a would close the cycle a -> b -> c -> a.
        let err = add_blocker(&db.pool, "tx-a", "tx-c").await.unwrap_err();
        assert_eq!(err.code(), "CircularDependency");
    }

    #[tokio::test]
    async fn remove_blocker_missing_edge_is_an_error() {
        let db = create_test_db().await;
        let now = Utc::now();
        for id in ["tx-a", "tx-b"] {
            sqlx::query(
                "INSERT INTO tasks (id, title, status, score, metadata, created_at, updated_at) \
                 VALUES (?, ?, 'backlog', 0, '{}', ?, ?)",
            )
            .bind(id)
            .bind(id)
            .bind(now)
            .bind(now)
            .execute(&db.pool)
            .await
            .unwrap();
        }

        let err = remove_blocker(&db.pool, "tx-b", "tx-a").await.unwrap_err();
        assert_eq!(err.code(), "DependencyNotFound");
    }
}
