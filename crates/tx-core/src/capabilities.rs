//! Pluggable capability contracts: embedding, reranking, summarization,
//! and candidate extraction. Each is object-safe so the kernel facade can
//! hold it behind `Arc<dyn Trait>`, selected at startup by whichever
//! backend configuration resolves (absence always selects the no-op
//! variant, never a startup error).

use async_trait::async_trait;

use tx_db::models::{Run, Task};

use crate::errors::{Error, Result};

/// One row the no-op `Extractor` would otherwise have to fabricate —
/// describes a learning candidate before it has been assigned an id.
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    pub content: String,
    pub confidence: tx_db::models::CandidateConfidence,
    pub category: Option<String>,
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Declared dimensionality, used to validate stored embeddings before
    /// a cosine comparison; `0` for the no-op embedder (never queried).
    fn dimensions(&self) -> usize;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per candidate, same order, each in `[0, 1]`.
    async fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Returns `(summary, learnings_text)` for a batch of tasks about to
    /// be compacted away.
    async fn summarize(&self, tasks: &[Task]) -> Result<(String, String)>;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, run: &Run) -> Result<Vec<CandidateDraft>>;
}

/// Disables retrieval's vector-search stage entirely rather than
/// fabricating zero vectors; the core still serves task coordination
/// with retrieval degraded to lexical-only.
pub struct NoopEmbedder;

#[async_trait]
impl Embedder for NoopEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable)
    }

    fn dimensions(&self) -> usize {
        0
    }
}

/// Identity reranker: returns the candidates' existing order unchanged.
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        Ok(vec![0.0; candidates.len()])
    }
}

/// Degrades compaction to "delete with no learnings extracted" rather
/// than failing it outright.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _tasks: &[Task]) -> Result<(String, String)> {
        Ok((String::new(), String::new()))
    }
}

pub struct NoopExtractor;

#[async_trait]
impl Extractor for NoopExtractor {
    async fn extract(&self, _run: &Run) -> Result<Vec<CandidateDraft>> {
        Ok(Vec::new())
    }
}
