//! The kernel facade: the single composed struct a host process builds
//! once from a storage path and a capability selection, then uses for
//! every operation described by the rest of this crate.

use std::sync::Arc;

use sqlx::SqlitePool;

use tx_db::config::DbConfig;
use tx_db::{pool as db_pool, queries};

use crate::capabilities::{Embedder, Extractor, NoopEmbedder, NoopExtractor, NoopReranker, NoopSummarizer, Reranker, Summarizer};
use crate::errors::Result;

/// Capability selection. Any field left `None` falls back to the no-op
/// variant — absence of a configured backend is never a startup error
/// (§6.1 "Environment": a missing API key silently selects the no-op
/// capability).
#[derive(Default)]
pub struct KernelConfig {
    pub db_path: Option<std::path::PathBuf>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub extractor: Option<Arc<dyn Extractor>>,
}

pub struct Kernel {
    pub pool: SqlitePool,
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub summarizer: Arc<dyn Summarizer>,
    pub extractor: Arc<dyn Extractor>,
}

/// Build the kernel: open (creating if needed) the SQLite database at
/// the resolved path, run migrations, and wire whichever capabilities
/// were supplied.
pub async fn build(config: KernelConfig) -> Result<Kernel> {
    let db_config = match config.db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_env(),
    };
    let pool = db_pool::create_pool(&db_config).await.map_err(|e| crate::errors::Error::Database(sqlx_err(e)))?;
    db_pool::run_migrations(&pool, db_pool::default_migrations_path())
        .await
        .map_err(|e| crate::errors::Error::Database(sqlx_err(e)))?;

    Ok(Kernel {
        pool,
        embedder: config.embedder.unwrap_or_else(|| Arc::new(NoopEmbedder)),
        reranker: config.reranker.unwrap_or_else(|| Arc::new(NoopReranker)),
        summarizer: config.summarizer.unwrap_or_else(|| Arc::new(NoopSummarizer)),
        extractor: config.extractor.unwrap_or_else(|| Arc::new(NoopExtractor)),
    })
}

/// `anyhow::Error` (what `tx_db::pool` returns) doesn't carry a
/// `sqlx::Error` we can re-wrap directly; collapse it to a generic
/// database error message instead of losing the failure entirely.
fn sqlx_err(e: anyhow::Error) -> sqlx::Error {
    sqlx::Error::Configuration(e.to_string().into())
}

impl Kernel {
    pub async fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        Ok(db_pool::table_counts(&self.pool).await.map_err(|e| crate::errors::Error::Database(sqlx_err(e)))?)
    }

    pub async fn list_attempts(&self, task_id: &str) -> Result<Vec<tx_db::models::Attempt>> {
        Ok(queries::attempts::list_attempts_for_task(&self.pool, task_id).await?)
    }

    pub async fn record_attempt(
        &self,
        task_id: &str,
        approach: &str,
        outcome: tx_db::models::AttemptOutcome,
        reason: Option<&str>,
    ) -> Result<tx_db::models::Attempt> {
        let id = crate::ids::attempt_id();
        let new_attempt = queries::attempts::NewAttempt {
            id: &id,
            task_id,
            approach,
            outcome,
            reason,
            now: chrono::Utc::now(),
        };
        Ok(queries::attempts::insert_attempt(&self.pool, &new_attempt).await?)
    }

    pub async fn add_learning(
        &self,
        content: &str,
        source_type: tx_db::models::SourceType,
        source_ref: Option<&str>,
        keywords: &str,
        category: Option<&str>,
    ) -> Result<tx_db::models::Learning> {
        let id = crate::ids::learning_id();
        let new_learning = queries::learnings::NewLearning {
            id: &id,
            content,
            source_type,
            source_ref,
            keywords,
            category,
            embedding: None,
            now: chrono::Utc::now(),
        };
        Ok(queries::learnings::insert_learning(&self.pool, &new_learning).await?)
    }

    pub async fn get_learning(&self, id: &str) -> Result<tx_db::models::Learning> {
        queries::learnings::get_learning(&self.pool, id)
            .await?
            .ok_or_else(|| crate::errors::Error::LearningNotFound(id.to_string()))
    }

    pub async fn list_learnings(&self, limit: i64) -> Result<Vec<tx_db::models::Learning>> {
        Ok(queries::learnings::list_recent(&self.pool, limit).await?)
    }

    pub async fn delete_learning(&self, id: &str) -> Result<()> {
        let rows = queries::learnings::delete_learning(&self.pool, id).await?;
        if rows == 0 {
            return Err(crate::errors::Error::LearningNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_all_noop_capabilities_by_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let kernel = build(KernelConfig {
            db_path: Some(dir.path().join("kernel_test.db")),
            ..Default::default()
        })
        .await
        .unwrap();

        let err = kernel.embedder.embed("hello").await.unwrap_err();
        assert_eq!(err.code(), "EmbeddingUnavailable");

        let counts = kernel.table_counts().await.unwrap();
        assert!(counts.iter().any(|(name, _)| name == "tasks"));
    }
}
