//! Candidate promotion and task compaction.
//!
//! Promotion turns a reviewed `Candidate` into a durable `Learning`.
//! Compaction removes old, fully-done task subtrees after handing their
//! content to a summarizer, so the task store doesn't grow without bound.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use tx_db::models::{Candidate, CandidateConfidence, CandidateStatus, Learning};
use tx_db::queries::{candidates as candidate_db, compaction as compaction_db, learnings as learning_db, provenance as provenance_db};

use crate::capabilities::{Embedder, Summarizer};
use crate::errors::{Error, Result};
use crate::ids;

/// Cosine similarity at or above this threshold against an existing
/// learning means a candidate is a near-duplicate, not a new one.
const NEAR_DUPLICATE_THRESHOLD: f64 = 0.85;

const DERIVED_FROM_RELATION: &str = "DERIVED_FROM";

pub struct NewCandidateInput<'a> {
    pub content: &'a str,
    pub confidence: CandidateConfidence,
    pub source_run_id: Option<&'a str>,
    pub source_task_id: Option<&'a str>,
    pub category: Option<&'a str>,
    pub keywords: &'a str,
}

pub async fn submit_candidate(pool: &SqlitePool, input: NewCandidateInput<'_>) -> Result<Candidate> {
    let id = ids::candidate_id();
    let new_candidate = candidate_db::NewCandidate {
        id: &id,
        content: input.content,
        confidence: input.confidence,
        source_run_id: input.source_run_id,
        source_task_id: input.source_task_id,
        category: input.category,
        keywords: input.keywords,
        now: Utc::now(),
    };
    Ok(candidate_db::insert_candidate(pool, &new_candidate).await?)
}

pub async fn get_candidate(pool: &SqlitePool, id: &str) -> Result<Candidate> {
    candidate_db::get_candidate(pool, id)
        .await?
        .ok_or_else(|| Error::CandidateNotFound(id.to_string()))
}

pub async fn list_pending(pool: &SqlitePool, limit: i64) -> Result<Vec<Candidate>> {
    Ok(candidate_db::list_pending(pool, limit).await?)
}

/// Create a Learning from a reviewed candidate, add a provenance edge to
/// its source run/task, and mark the candidate `promoted`.
pub async fn promote(pool: &SqlitePool, candidate_id: &str) -> Result<Learning> {
    let candidate = get_candidate(pool, candidate_id).await?;

    let learning_id = ids::learning_id();
    let source_type = if candidate.source_run_id.is_some() {
        tx_db::models::SourceType::Run
    } else {
        tx_db::models::SourceType::Manual
    };
    let new_learning = learning_db::NewLearning {
        id: &learning_id,
        content: &candidate.content,
        source_type,
        source_ref: candidate.source_task_id.as_deref(),
        keywords: &candidate.keywords,
        category: candidate.category.as_deref(),
        embedding: None,
        now: Utc::now(),
    };
    let learning = learning_db::insert_learning(pool, &new_learning).await?;

    // Provenance is best-effort: a failure here is logged and ignored
    // rather than failing the promotion.
    if let Some(source_task_id) = &candidate.source_task_id {
        if let Err(e) =
            provenance_db::insert_provenance(pool, &learning.id, source_task_id, DERIVED_FROM_RELATION, Utc::now()).await
        {
            tracing::warn!(error = %e, candidate_id, "provenance record insert failed");
        }
    }

    candidate_db::resolve(pool, candidate_id, CandidateStatus::Promoted, None).await?;
    Ok(learning)
}

pub struct AutoPromoteReport {
    pub promoted: u64,
    pub merged: u64,
}

/// Processes high-confidence pending candidates: each is either promoted
/// outright, or — if a near-duplicate learning already exists (cosine
/// similarity at or above the threshold) — marked `merged` into that
/// learning's id instead of creating a duplicate.
pub async fn auto_promote(pool: &SqlitePool, embedder: &dyn Embedder, batch_size: i64) -> Result<AutoPromoteReport> {
    let pending = candidate_db::list_pending(pool, batch_size).await?;
    let mut report = AutoPromoteReport { promoted: 0, merged: 0 };

    for candidate in pending {
        if candidate.confidence != CandidateConfidence::High {
            continue;
        }

        match find_near_duplicate(pool, embedder, &candidate.content).await? {
            Some(existing_learning_id) => {
                candidate_db::resolve(pool, &candidate.id, CandidateStatus::Merged, Some(&existing_learning_id))
                    .await?;
                report.merged += 1;
            }
            None => {
                promote(pool, &candidate.id).await?;
                report.promoted += 1;
            }
        }
    }

    Ok(report)
}

async fn find_near_duplicate(pool: &SqlitePool, embedder: &dyn Embedder, content: &str) -> Result<Option<String>> {
    let query_embedding = match embedder.embed(content).await {
        Ok(v) => v,
        Err(Error::EmbeddingUnavailable) => return Ok(None),
        Err(e) => return Err(e),
    };

    let embedded = learning_db::list_embedded(pool).await?;
    let mut best: Option<(String, f64)> = None;
    for learning in embedded {
        let Some(bytes) = learning.embedding.as_deref() else { continue };
        let stored: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if stored.len() != query_embedding.len() {
            continue;
        }
        let dot: f64 = query_embedding.iter().zip(&stored).map(|(x, y)| *x as f64 * *y as f64).sum();
        let norm_q: f64 = query_embedding.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        let norm_s: f64 = stored.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        if norm_q == 0.0 || norm_s == 0.0 {
            continue;
        }
        let similarity = dot / (norm_q * norm_s);
        if similarity >= NEAR_DUPLICATE_THRESHOLD && best.as_ref().is_none_or(|(_, s)| similarity > *s) {
            best = Some((learning.id, similarity));
        }
    }
    Ok(best.map(|(id, _)| id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Overwrite,
    Append,
}

pub struct CompactOptions<'a> {
    pub before: DateTime<Utc>,
    pub output_file: Option<&'a str>,
    pub dry_run: bool,
    pub output_mode: OutputMode,
}

pub struct CompactReport {
    pub tasks_deleted: i64,
    pub summary: String,
}

/// Enumerates done task subtrees completed before the cutoff, hands them
/// to the summarizer, writes the learnings file, and only then deletes
/// the tasks plus their dependency rows — all inside one transaction. A
/// file-write failure aborts before any row is touched.
pub async fn compact(pool: &SqlitePool, summarizer: &dyn Summarizer, options: CompactOptions<'_>) -> Result<CompactReport> {
    let task_ids = compaction_db::find_compactable_task_ids(pool, options.before).await?;
    if task_ids.is_empty() {
        return Ok(CompactReport {
            tasks_deleted: 0,
            summary: String::new(),
        });
    }

    let tasks = tx_db::queries::tasks::get_tasks_batch(pool, &task_ids).await?;
    let (summary, learnings_text) = summarizer.summarize(&tasks).await?;

    if options.dry_run {
        return Ok(CompactReport {
            tasks_deleted: task_ids.len() as i64,
            summary,
        });
    }

    if let Some(path) = options.output_file {
        write_learnings_file(path, &learnings_text, options.output_mode).await?;
    }

    let mut tx = pool.begin().await?;

    let placeholders = std::iter::repeat("?").take(task_ids.len()).collect::<Vec<_>>().join(",");
    let dep_sql = format!(
        "DELETE FROM task_dependencies WHERE blocker_id IN ({placeholders}) OR blocked_id IN ({placeholders})"
    );
    let mut dep_query = sqlx::query(&dep_sql);
    for id in &task_ids {
        dep_query = dep_query.bind(id);
    }
    for id in &task_ids {
        dep_query = dep_query.bind(id);
    }
    dep_query.execute(&mut *tx).await?;

    let task_sql = format!("DELETE FROM tasks WHERE id IN ({placeholders})");
    let mut task_query = sqlx::query(&task_sql);
    for id in &task_ids {
        task_query = task_query.bind(id);
    }
    task_query.execute(&mut *tx).await?;

    sqlx::query(
        "INSERT INTO compaction_log (ran_at, cutoff, tasks_deleted, output_file, summary) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Utc::now())
    .bind(options.before)
    .bind(task_ids.len() as i64)
    .bind(options.output_file)
    .bind(&summary)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(CompactReport {
        tasks_deleted: task_ids.len() as i64,
        summary,
    })
}

async fn write_learnings_file(path: &str, text: &str, mode: OutputMode) -> Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = match mode {
        OutputMode::Overwrite => tokio::fs::File::create(path).await,
        OutputMode::Append => tokio::fs::OpenOptions::new().create(true).append(true).open(path).await,
    }
    .map_err(|e| Error::ValidationError(format!("failed to open learnings file {path}: {e}")))?;
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| Error::ValidationError(format!("failed to write learnings file {path}: {e}")))?;
    Ok(())
}

pub async fn list_recent_compactions(pool: &SqlitePool, limit: i64) -> Result<Vec<tx_db::models::CompactionLogEntry>> {
    Ok(compaction_db::list_recent(pool, limit).await?)
}
