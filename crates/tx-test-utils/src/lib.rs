//! Shared test utilities for `tx` integration tests.
//!
//! Unlike a server-backed store, SQLite needs no shared container: each
//! test gets its own on-disk database file inside a fresh temp directory,
//! migrated and ready to use. The directory is returned alongside the pool
//! so it stays alive (and gets cleaned up) for the test's duration.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

use tx_db::pool as db_pool;

/// A temporary, migrated SQLite database. Drop this to delete the backing
/// directory; keep it alive for as long as `pool` is in use.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Create a temporary database with migrations applied.
pub async fn create_test_db() -> TestDb {
    let dir = TempDir::new().expect("failed to create temp dir for test database");
    let db_path = dir.path().join("tx_test.db");

    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to temp database {}: {e}", db_path.display()));

    db_pool::run_migrations(&pool, db_pool::default_migrations_path())
        .await
        .expect("migrations should succeed");

    TestDb { pool, _dir: dir }
}
