use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::LearningEdge;

pub async fn insert_edge(
    pool: &SqlitePool,
    from_learning_id: &str,
    to_learning_id: &str,
    edge_type: &str,
    now: DateTime<Utc>,
) -> Result<LearningEdge, sqlx::Error> {
    sqlx::query_as::<_, LearningEdge>(
        "INSERT INTO learning_edges (from_learning_id, to_learning_id, edge_type, created_at) \
         VALUES (?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(from_learning_id)
    .bind(to_learning_id)
    .bind(edge_type)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// One BFS hop outward from a frontier of learning ids, both directions
/// (edges are not inherently symmetric, but graph expansion in the
/// retrieval pipeline treats `related_to` as traversable either way).
pub async fn neighbors(pool: &SqlitePool, learning_ids: &[String]) -> Result<Vec<String>, sqlx::Error> {
    if learning_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(learning_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "SELECT to_learning_id FROM learning_edges WHERE from_learning_id IN ({placeholders}) \
         UNION \
         SELECT from_learning_id FROM learning_edges WHERE to_learning_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as(&query);
    for id in learning_ids {
        q = q.bind(id);
    }
    for id in learning_ids {
        q = q.bind(id);
    }
    let rows: Vec<(String,)> = q.fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Every edge touching any of `learning_ids`, in either direction, full
/// rows (not just the neighbor id) — used by the retrieval pipeline's
/// graph-expansion stage, which needs `edge_type` to filter by permitted
/// types and the edge itself to annotate a hop's `sourceEdge`.
pub async fn edges_touching(pool: &SqlitePool, learning_ids: &[String]) -> Result<Vec<LearningEdge>, sqlx::Error> {
    if learning_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(learning_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let query = format!(
        "SELECT * FROM learning_edges \
         WHERE from_learning_id IN ({placeholders}) OR to_learning_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, LearningEdge>(&query);
    for id in learning_ids {
        q = q.bind(id);
    }
    for id in learning_ids {
        q = q.bind(id);
    }
    q.fetch_all(pool).await
}

pub async fn delete_edge(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM learning_edges WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
