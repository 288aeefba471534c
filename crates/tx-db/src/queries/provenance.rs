use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::LearningProvenance;

pub async fn insert_provenance(
    pool: &SqlitePool,
    learning_id: &str,
    task_id: &str,
    relation: &str,
    now: DateTime<Utc>,
) -> Result<LearningProvenance, sqlx::Error> {
    sqlx::query_as::<_, LearningProvenance>(
        "INSERT INTO learning_provenance (learning_id, task_id, relation, created_at) \
         VALUES (?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(learning_id)
    .bind(task_id)
    .bind(relation)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn list_for_learning(pool: &SqlitePool, learning_id: &str) -> Result<Vec<LearningProvenance>, sqlx::Error> {
    sqlx::query_as::<_, LearningProvenance>("SELECT * FROM learning_provenance WHERE learning_id = ?")
        .bind(learning_id)
        .fetch_all(pool)
        .await
}
