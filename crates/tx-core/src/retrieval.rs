//! Hybrid learning retrieval: lexical FTS5 plus vector cosine similarity,
//! fused by Reciprocal Rank Fusion, optionally expanded over the learning
//! graph, reranked, diversified by MMR, and weighted by historical
//! feedback. Each stage is independently toggleable via `RetrievalOptions`
//! so the pipeline degrades gracefully when a pluggable capability is the
//! no-op variant.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;

use tx_db::models::{Learning, SourceType};
use tx_db::queries::{feedback as feedback_db, learning_edges as edge_db, learnings as db};

use crate::capabilities::{Embedder, Reranker};
use crate::errors::{Error, Result};

const RRF_K: f64 = 60.0;
/// Within the first five MMR picks, at most this many may share a
/// category — keeps one prolific category from crowding out the rest of
/// the "top of the list" a reader scans first. Beyond the fifth pick the
/// cap no longer applies.
const MMR_CATEGORY_CAP_IN_TOP_FIVE: usize = 2;
const MMR_TOP_FIVE: usize = 5;
/// Width of the lexical/vector candidate pools fed into fusion, wider
/// than any plausible `limit` so truncation never starves fusion.
const CANDIDATE_POOL_WIDTH: i64 = 50;

pub struct GraphExpansionOptions {
    pub depth: u32,
    pub decay_factor: f64,
    pub max_nodes: usize,
    /// Edge types eligible for traversal; an empty list permits all
    /// types (no restriction), since the common case has no curated
    /// taxonomy of edge types yet.
    pub permitted_edge_types: Vec<String>,
}

pub struct RetrievalOptions {
    pub limit: usize,
    pub min_score: f64,
    pub category: Option<String>,
    pub source_type: Option<SourceType>,
    pub use_vector_search: bool,
    pub graph_expansion: Option<GraphExpansionOptions>,
    pub use_reranker: bool,
    pub use_mmr: bool,
    pub mmr_lambda: f64,
    pub use_feedback: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.0,
            category: None,
            source_type: None,
            use_vector_search: true,
            graph_expansion: None,
            use_reranker: true,
            use_mmr: true,
            mmr_lambda: 0.7,
            use_feedback: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpansionHop {
    pub hops: u32,
    pub path: Vec<String>,
    pub source_edge_type: String,
}

pub struct LearningWithScore {
    pub learning: Learning,
    pub score: f64,
    pub expansion: Option<ExpansionHop>,
}

pub async fn retrieve(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    reranker: &dyn Reranker,
    query: &str,
    options: &RetrievalOptions,
) -> Result<Vec<LearningWithScore>> {
    let lexical = lexical_search(pool, query).await?;
    let vector = if options.use_vector_search {
        vector_search(pool, embedder, query).await?
    } else {
        Vec::new()
    };

    let mut fused = fuse_rrf(&lexical, &vector);

    if let Some(graph_options) = &options.graph_expansion {
        expand_graph(pool, &mut fused, graph_options).await?;
    }

    let candidate_ids: Vec<String> = fused.keys().cloned().collect();
    let learnings = db::get_learnings_batch(pool, &candidate_ids).await?;
    let mut by_id: HashMap<String, Learning> = learnings.into_iter().map(|l| (l.id.clone(), l)).collect();

    let mut scored: Vec<LearningWithScore> = fused
        .into_iter()
        .filter_map(|(id, (score, expansion))| {
            by_id.remove(&id).map(|learning| LearningWithScore { learning, score, expansion })
        })
        .collect();

    if options.use_reranker {
        let texts: Vec<String> = scored.iter().map(|s| s.learning.content.clone()).collect();
        let rerank_scores = reranker.rerank(query, &texts).await?;
        for (item, rerank_score) in scored.iter_mut().zip(rerank_scores) {
            item.score += rerank_score as f64;
        }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut result = if options.use_mmr {
        mmr_diversify(scored, options.mmr_lambda, options.limit)
    } else {
        scored.truncate(options.limit);
        scored
    };

    if options.use_feedback {
        for item in &mut result {
            if let Some(fb) = feedback_db::get(pool, &item.learning.id).await? {
                item.score *= fb.score;
            }
        }
        result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    result.retain(|item| item.score >= options.min_score);
    if let Some(category) = &options.category {
        result.retain(|item| item.learning.category.as_deref() == Some(category.as_str()));
    }
    if let Some(source_type) = &options.source_type {
        result.retain(|item| &item.learning.source_type == source_type);
    }
    result.truncate(options.limit);

    Ok(result)
}

/// A three-tier match expression: exact phrase, OR a proximity-10 window
/// of the same terms, OR a plain term-OR — broadest recall first, FTS5
/// ranks the tighter matches higher via `bm25()` regardless of which
/// clause matched.
fn build_match_expr(query: &str) -> String {
    let terms: Vec<&str> = query.split_whitespace().filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return String::from("\"\"");
    }
    let phrase = format!("\"{}\"", terms.join(" "));
    let proximity = format!("NEAR(\"{}\", 10)", terms.join("\" \""));
    let term_or = terms.join(" OR ");
    format!("({phrase}) OR ({proximity}) OR ({term_or})")
}

/// Decayed lexical rank score: `1 / (1 + rank * 0.1)`, so a better (more
/// negative) `bm25()` rank produces a larger decayed score once the sign
/// is normalized by the ordering `fts_search` already applied.
async fn lexical_search(pool: &SqlitePool, query: &str) -> Result<Vec<(String, f64)>> {
    let match_expr = build_match_expr(query);
    let hits = db::fts_search(pool, &match_expr, CANDIDATE_POOL_WIDTH).await?;
    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| (hit.learning_id, 1.0 / (1.0 + (i + 1) as f64 * 0.1)))
        .collect())
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Vector search against every stored embedding. A no-op embedder
/// returns `EmbeddingUnavailable` for the query itself, which this stage
/// treats as "vector search is disabled" rather than propagating an
/// error — degrading retrieval to lexical-only, per the no-op contract.
/// A dimension mismatch against an actually-configured embedder is a
/// real error and aborts the call.
async fn vector_search(pool: &SqlitePool, embedder: &dyn Embedder, query: &str) -> Result<Vec<(String, f64)>> {
    let query_embedding = match embedder.embed(query).await {
        Ok(v) => v,
        Err(Error::EmbeddingUnavailable) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let embedded = db::list_embedded(pool).await?;
    let mut scored = Vec::with_capacity(embedded.len());
    for learning in embedded {
        let Some(bytes) = learning.embedding.as_deref() else {
            continue;
        };
        let stored = decode_embedding(bytes);
        if stored.len() != query_embedding.len() {
            return Err(Error::EmbeddingDimensionMismatch {
                expected: query_embedding.len(),
                actual: stored.len(),
            });
        }
        let similarity = (cosine_similarity(&query_embedding, &stored) + 1.0) / 2.0;
        scored.push((learning.id, similarity));
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(CANDIDATE_POOL_WIDTH as usize);
    Ok(scored)
}

type FusedMap = HashMap<String, (f64, Option<ExpansionHop>)>;

fn fuse_rrf(lexical: &[(String, f64)], vector: &[(String, f64)]) -> FusedMap {
    let mut fused: FusedMap = HashMap::new();
    for (rank, (id, _)) in lexical.iter().enumerate() {
        let entry = fused.entry(id.clone()).or_insert((0.0, None));
        entry.0 += 1.0 / (RRF_K + (rank + 1) as f64);
    }
    for (rank, (id, _)) in vector.iter().enumerate() {
        let entry = fused.entry(id.clone()).or_insert((0.0, None));
        entry.0 += 1.0 / (RRF_K + (rank + 1) as f64);
    }
    fused
}

/// BFS outward from the current fused set, up to `depth` hops, applying
/// `decay_factor` per hop to the seed's score and capping the number of
/// nodes this stage adds at `max_nodes`. A node already present in
/// `fused` (a direct lexical/vector hit) keeps its existing score and is
/// not annotated with expansion metadata — expansion only explains how a
/// node got in when it wasn't a direct hit.
async fn expand_graph(pool: &SqlitePool, fused: &mut FusedMap, options: &GraphExpansionOptions) -> Result<()> {
    if options.depth == 0 || options.max_nodes == 0 {
        return Ok(());
    }

    let seeds: Vec<(String, f64)> = fused.iter().map(|(id, (score, _))| (id.clone(), *score)).collect();
    let mut visited: HashSet<String> = seeds.iter().map(|(id, _)| id.clone()).collect();
    let mut added = 0usize;

    for (seed_id, seed_score) in seeds {
        let mut frontier = vec![(seed_id.clone(), vec![seed_id.clone()], seed_score)];
        for hop in 1..=options.depth {
            if added >= options.max_nodes {
                break;
            }
            let frontier_ids: Vec<String> = frontier.iter().map(|(id, _, _)| id.clone()).collect();
            if frontier_ids.is_empty() {
                break;
            }
            let edges = edge_db::edges_touching(pool, &frontier_ids).await?;
            let mut next_frontier = Vec::new();

            for (current_id, path, current_score) in &frontier {
                for edge in &edges {
                    if !options.permitted_edge_types.is_empty()
                        && !options.permitted_edge_types.contains(&edge.edge_type)
                    {
                        continue;
                    }
                    let neighbor = if &edge.from_learning_id == current_id {
                        Some(&edge.to_learning_id)
                    } else if &edge.to_learning_id == current_id {
                        Some(&edge.from_learning_id)
                    } else {
                        None
                    };
                    let Some(neighbor) = neighbor else { continue };
                    if visited.contains(neighbor) || added >= options.max_nodes {
                        continue;
                    }
                    visited.insert(neighbor.clone());
                    added += 1;

                    let mut next_path = path.clone();
                    next_path.push(neighbor.clone());
                    let decayed_score = current_score * options.decay_factor;

                    fused.insert(
                        neighbor.clone(),
                        (
                            decayed_score,
                            Some(ExpansionHop {
                                hops: hop,
                                path: next_path.clone(),
                                source_edge_type: edge.edge_type.clone(),
                            }),
                        ),
                    );
                    next_frontier.push((neighbor.clone(), next_path, decayed_score));
                }
            }
            frontier = next_frontier;
        }
    }

    Ok(())
}

/// Token-overlap (Jaccard) similarity over lowercased whitespace tokens,
/// used as MMR's `maxSim` — a lightweight, deterministic stand-in that
/// doesn't require every candidate to carry an embedding.
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

fn mmr_diversify(candidates: Vec<LearningWithScore>, lambda: f64, limit: usize) -> Vec<LearningWithScore> {
    let mut pool = candidates;
    let mut picked: Vec<LearningWithScore> = Vec::with_capacity(limit.min(pool.len()));
    let mut category_counts: HashMap<String, usize> = HashMap::new();

    while !pool.is_empty() && picked.len() < limit {
        let mut best_index = None;
        let mut best_mmr = f64::NEG_INFINITY;

        for (i, candidate) in pool.iter().enumerate() {
            if picked.len() < MMR_TOP_FIVE {
                if let Some(category) = &candidate.learning.category {
                    let count = category_counts.get(category).copied().unwrap_or(0);
                    if count >= MMR_CATEGORY_CAP_IN_TOP_FIVE {
                        continue;
                    }
                }
            }

            let max_sim = picked
                .iter()
                .map(|p| jaccard_similarity(&candidate.learning.content, &p.learning.content))
                .fold(0.0_f64, f64::max);

            let mmr_score = lambda * candidate.score - (1.0 - lambda) * max_sim;
            if mmr_score > best_mmr {
                best_mmr = mmr_score;
                best_index = Some(i);
            }
        }

        let Some(index) = best_index else { break };
        let chosen = pool.remove(index);
        if let Some(category) = &chosen.learning.category {
            *category_counts.entry(category.clone()).or_insert(0) += 1;
        }
        picked.push(chosen);
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn match_expr_includes_all_three_tiers() {
        let expr = build_match_expr("foo bar");
        assert!(expr.contains("\"foo bar\""));
        assert!(expr.contains("NEAR("));
        assert!(expr.contains("foo OR bar"));
    }
}
