//! Integration tests for database migrations and connection pooling.
//!
//! Each test creates a fresh temp-file SQLite database, runs migrations
//! against it, and lets the temp directory clean itself up on drop.

use sqlx::Row;

use tx_db::pool;
use tx_test_utils::create_test_db;

/// Expected tables created by the initial migration (excluding the FTS5
/// shadow tables, which SQLite manages implicitly).
const EXPECTED_TABLES: &[&str] = &[
    "anchor_invalidations",
    "attempts",
    "candidates",
    "claims",
    "compaction_log",
    "learning_anchors",
    "learning_edges",
    "learning_feedback",
    "learning_provenance",
    "learnings",
    "orchestrator_state",
    "outbox_messages",
    "run_heartbeats",
    "runs",
    "task_dependencies",
    "tasks",
    "workers",
];

#[tokio::test]
async fn migrations_create_all_tables() {
    let db = create_test_db().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' AND name NOT LIKE '%_fts%' \
         ORDER BY name",
    )
    .fetch_all(&db.pool)
    .await
    .expect("should list tables");

    let table_names: Vec<&str> = rows.iter().map(|(name,)| name.as_str()).collect();

    assert_eq!(
        table_names, EXPECTED_TABLES,
        "migration should create exactly the expected tables"
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = create_test_db().await;

    // Run migrations again -- should be a no-op.
    pool::run_migrations(&db.pool, pool::default_migrations_path())
        .await
        .expect("second migration run should succeed (idempotent)");

    for table in EXPECTED_TABLES {
        let query = format!("SELECT COUNT(*) AS cnt FROM {table}");
        let row = sqlx::query(&query)
            .fetch_one(&db.pool)
            .await
            .unwrap_or_else(|e| panic!("failed to count {table}: {e}"));
        let count: i64 = row.get("cnt");
        let expected = if *table == "orchestrator_state" { 1 } else { 0 };
        assert_eq!(count, expected, "table {table} should have the expected row count");
    }
}

#[tokio::test]
async fn pool_creates_and_destroys_cleanly() {
    let db = create_test_db().await;

    let one: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(&db.pool)
        .await
        .expect("simple query should work");
    assert_eq!(one.0, 1);

    db.pool.close().await;
}

#[tokio::test]
async fn table_counts_returns_expected_tables() {
    let db = create_test_db().await;

    let counts = pool::table_counts(&db.pool)
        .await
        .expect("table_counts should succeed");

    let user_counts: Vec<(&str, i64)> = counts
        .iter()
        .filter(|(name, _)| !name.starts_with("_sqlx") && !name.starts_with("sqlite_"))
        .map(|(name, count)| (name.as_str(), *count))
        .collect();

    assert_eq!(user_counts.len(), EXPECTED_TABLES.len());
    for (name, count) in &user_counts {
        let expected = if *name == "orchestrator_state" { 1 } else { 0 };
        assert_eq!(*count, expected, "table {name} should have the expected row count");
    }
}

#[tokio::test]
async fn orchestrator_state_seed_row_present() {
    let db = create_test_db().await;

    let (status,): (String,) = sqlx::query_as("SELECT status FROM orchestrator_state WHERE id = 1")
        .fetch_one(&db.pool)
        .await
        .expect("seed row should exist");
    assert_eq!(status, "stopped");
}
