//! `tx learning {add|get|list|remove|search}`, candidate review, outbox
//! messaging, and anchor upkeep.
//!
//! Most row types here (`Learning`, `Candidate`, `LearningAnchor`,
//! `OutboxMessage`) don't derive `Serialize` — `Learning::embedding` in
//! particular is never meant to reach a client — so `--json` output is
//! built by hand via `serde_json::json!`, omitting that field.

use clap::Subcommand;
use serde_json::json;

use tx_core::kernel::Kernel;
use tx_core::retrieval::RetrievalOptions;
use tx_core::{anchors, outbox, promotion, retrieval};
use tx_db::models::{CandidateConfidence, Learning, LearningAnchor, OutboxMessage, SourceType};

use crate::output::{CliError, CmdResult, emit};

#[derive(Subcommand)]
pub enum LearningCommands {
    /// Record a learning directly, bypassing candidate review.
    Add {
        content: String,
        #[arg(long, default_value = "manual")]
        source_type: String,
        #[arg(long)]
        source_ref: Option<String>,
        #[arg(long, default_value = "")]
        keywords: String,
        #[arg(long)]
        category: Option<String>,
    },
    Get { id: String },
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    Remove { id: String },
    /// Hybrid lexical + vector retrieval with RRF fusion and MMR.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        no_mmr: bool,
        #[arg(long)]
        no_reranker: bool,
        #[arg(long)]
        no_vector: bool,
        #[arg(long)]
        no_feedback: bool,
    },
    /// Submit a candidate for later review/promotion.
    Submit {
        content: String,
        #[arg(long, default_value = "medium")]
        confidence: String,
        #[arg(long)]
        source_run_id: Option<String>,
        #[arg(long)]
        source_task_id: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        keywords: String,
    },
    /// List pending candidates awaiting review.
    ListPending {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Promote a reviewed candidate into a durable learning.
    Promote { candidate_id: String },
    /// Auto-promote high-confidence pending candidates using the
    /// configured embedder for near-duplicate detection.
    AutoPromote {
        #[arg(long, default_value_t = 50)]
        batch_size: i64,
    },
}

fn parse_source_type(raw: &str) -> CmdResult<SourceType> {
    match raw {
        "manual" => Ok(SourceType::Manual),
        "run" => Ok(SourceType::Run),
        "compaction" => Ok(SourceType::Compaction),
        "claude_md" => Ok(SourceType::ClaudeMd),
        other => Err(CliError::Usage(format!("invalid source type {other:?}"))),
    }
}

fn parse_confidence(raw: &str) -> CmdResult<CandidateConfidence> {
    match raw {
        "low" => Ok(CandidateConfidence::Low),
        "medium" => Ok(CandidateConfidence::Medium),
        "high" => Ok(CandidateConfidence::High),
        other => Err(CliError::Usage(format!("invalid confidence {other:?}"))),
    }
}

fn learning_json(l: &Learning) -> serde_json::Value {
    json!({
        "id": l.id,
        "content": l.content,
        "source_type": l.source_type.to_string(),
        "source_ref": l.source_ref,
        "created_at": l.created_at.to_rfc3339(),
        "keywords": l.keywords,
        "category": l.category,
        "usage_count": l.usage_count,
        "last_used_at": l.last_used_at.map(|d| d.to_rfc3339()),
        "outcome_score": l.outcome_score,
        "has_embedding": l.embedding.is_some(),
    })
}

fn print_learning(l: &Learning) {
    println!("{} [{}] {}", l.id, l.source_type, l.content);
    if let Some(category) = &l.category {
        println!("  category: {category}");
    }
    println!("  keywords: {}", l.keywords);
    println!("  usage_count: {}", l.usage_count);
}

pub async fn run(kernel: &Kernel, json_mode: bool, command: LearningCommands) -> CmdResult<()> {
    match command {
        LearningCommands::Add {
            content,
            source_type,
            source_ref,
            keywords,
            category,
        } => {
            let source_type = parse_source_type(&source_type)?;
            let learning = kernel
                .add_learning(&content, source_type, source_ref.as_deref(), &keywords, category.as_deref())
                .await
                .map_err(CliError::from)?;
            let value = learning_json(&learning);
            emit(json_mode, &value, |_| print_learning(&learning));
            Ok(())
        }
        LearningCommands::Get { id } => {
            let learning = kernel.get_learning(&id).await.map_err(CliError::from)?;
            let value = learning_json(&learning);
            emit(json_mode, &value, |_| print_learning(&learning));
            Ok(())
        }
        LearningCommands::List { limit } => {
            let learnings = kernel.list_learnings(limit).await.map_err(CliError::from)?;
            let value: Vec<_> = learnings.iter().map(learning_json).collect();
            emit(json_mode, &value, |_| {
                for l in &learnings {
                    print_learning(l);
                }
            });
            Ok(())
        }
        LearningCommands::Remove { id } => {
            kernel.delete_learning(&id).await.map_err(CliError::from)?;
            if !json_mode {
                println!("removed {id}");
            }
            Ok(())
        }
        LearningCommands::Search {
            query,
            limit,
            category,
            no_mmr,
            no_reranker,
            no_vector,
            no_feedback,
        } => {
            let options = RetrievalOptions {
                limit,
                category,
                use_vector_search: !no_vector,
                use_reranker: !no_reranker,
                use_mmr: !no_mmr,
                use_feedback: !no_feedback,
                ..Default::default()
            };
            let hits = retrieval::retrieve(&kernel.pool, kernel.embedder.as_ref(), kernel.reranker.as_ref(), &query, &options)
                .await
                .map_err(CliError::from)?;
            let value: Vec<_> = hits
                .iter()
                .map(|h| {
                    let mut v = learning_json(&h.learning);
                    v["score"] = json!(h.score);
                    v
                })
                .collect();
            emit(json_mode, &value, |_| {
                for hit in &hits {
                    println!("{:.4} {} {}", hit.score, hit.learning.id, hit.learning.content);
                }
            });
            Ok(())
        }
        LearningCommands::Submit {
            content,
            confidence,
            source_run_id,
            source_task_id,
            category,
            keywords,
        } => {
            let confidence = parse_confidence(&confidence)?;
            let candidate = promotion::submit_candidate(
                &kernel.pool,
                promotion::NewCandidateInput {
                    content: &content,
                    confidence,
                    source_run_id: source_run_id.as_deref(),
                    source_task_id: source_task_id.as_deref(),
                    category: category.as_deref(),
                    keywords: &keywords,
                },
            )
            .await
            .map_err(CliError::from)?;
            let value = json!({
                "id": candidate.id,
                "content": candidate.content,
                "confidence": candidate.confidence.to_string(),
                "status": candidate.status.to_string(),
            });
            emit(json_mode, &value, |_| println!("submitted candidate {}", candidate.id));
            Ok(())
        }
        LearningCommands::ListPending { limit } => {
            let candidates = promotion::list_pending(&kernel.pool, limit).await.map_err(CliError::from)?;
            let value: Vec<_> = candidates
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "content": c.content,
                        "confidence": c.confidence.to_string(),
                        "status": c.status.to_string(),
                    })
                })
                .collect();
            emit(json_mode, &value, |_| {
                for c in &candidates {
                    println!("{} [{}] {}", c.id, c.confidence, c.content);
                }
            });
            Ok(())
        }
        LearningCommands::Promote { candidate_id } => {
            let learning = promotion::promote(&kernel.pool, &candidate_id).await.map_err(CliError::from)?;
            let value = learning_json(&learning);
            emit(json_mode, &value, |_| println!("promoted to learning {}", learning.id));
            Ok(())
        }
        LearningCommands::AutoPromote { batch_size } => {
            let report = promotion::auto_promote(&kernel.pool, kernel.embedder.as_ref(), batch_size)
                .await
                .map_err(CliError::from)?;
            let value = json!({"promoted": report.promoted, "merged": report.merged});
            emit(json_mode, &value, |v| {
                println!("promoted={} merged={}", v["promoted"], v["merged"]);
            });
            Ok(())
        }
    }
}

#[derive(Subcommand)]
pub enum OutboxCommands {
    Send {
        channel: String,
        sender: String,
        content: String,
        #[arg(long)]
        correlation_id: Option<String>,
        #[arg(long)]
        task_id: Option<String>,
        #[arg(long, default_value = "{}")]
        metadata: String,
        #[arg(long)]
        ttl_seconds: Option<i64>,
    },
    Inbox {
        channel: String,
        #[arg(long, default_value_t = 0)]
        after_id: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
        #[arg(long)]
        include_acked: bool,
    },
    Ack { id: i64 },
    AckAll { channel: String },
    Gc {
        #[arg(long, default_value_t = 24)]
        acked_older_than_hours: i64,
    },
}

fn message_json(m: &OutboxMessage) -> serde_json::Value {
    json!({
        "id": m.id,
        "channel": m.channel,
        "sender": m.sender,
        "content": m.content,
        "status": m.status.to_string(),
        "correlation_id": m.correlation_id,
        "task_id": m.task_id,
        "metadata": m.metadata,
        "created_at": m.created_at.to_rfc3339(),
        "acked_at": m.acked_at.map(|d| d.to_rfc3339()),
        "expires_at": m.expires_at.map(|d| d.to_rfc3339()),
    })
}

pub async fn run_outbox(kernel: &Kernel, json_mode: bool, command: OutboxCommands) -> CmdResult<()> {
    match command {
        OutboxCommands::Send {
            channel,
            sender,
            content,
            correlation_id,
            task_id,
            metadata,
            ttl_seconds,
        } => {
            let message = outbox::send(
                &kernel.pool,
                outbox::SendInput {
                    channel: &channel,
                    sender: &sender,
                    content: &content,
                    correlation_id: correlation_id.as_deref(),
                    task_id: task_id.as_deref(),
                    metadata: &metadata,
                    ttl_seconds,
                },
            )
            .await
            .map_err(CliError::from)?;
            let value = message_json(&message);
            emit(json_mode, &value, |_| println!("sent message {} on {}", message.id, message.channel));
            Ok(())
        }
        OutboxCommands::Inbox {
            channel,
            after_id,
            limit,
            sender,
            correlation_id,
            include_acked,
        } => {
            let messages = outbox::inbox(
                &kernel.pool,
                outbox::InboxQuery {
                    channel: &channel,
                    after_id,
                    limit,
                    sender: sender.as_deref(),
                    correlation_id: correlation_id.as_deref(),
                    include_acked,
                },
            )
            .await
            .map_err(CliError::from)?;
            let value: Vec<_> = messages.iter().map(message_json).collect();
            emit(json_mode, &value, |_| {
                for m in &messages {
                    println!("{} [{}] {}: {}", m.id, m.status, m.sender, m.content);
                }
            });
            Ok(())
        }
        OutboxCommands::Ack { id } => {
            outbox::ack(&kernel.pool, id).await.map_err(CliError::from)?;
            if !json_mode {
                println!("acked {id}");
            }
            Ok(())
        }
        OutboxCommands::AckAll { channel } => {
            let count = outbox::ack_all(&kernel.pool, &channel).await.map_err(CliError::from)?;
            let value = json!({"acked": count});
            emit(json_mode, &value, |v| println!("acked {}", v["acked"]));
            Ok(())
        }
        OutboxCommands::Gc { acked_older_than_hours } => {
            let report = outbox::gc(&kernel.pool, acked_older_than_hours).await.map_err(CliError::from)?;
            let value = json!({"expired": report.expired, "acked": report.acked});
            emit(json_mode, &value, |v| {
                println!("expired={} acked={}", v["expired"], v["acked"]);
            });
            Ok(())
        }
    }
}

#[derive(Subcommand)]
pub enum AnchorCommands {
    Create {
        learning_id: String,
        anchor_type: String,
        file_path: String,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        line_start: Option<i64>,
        #[arg(long)]
        line_end: Option<i64>,
        #[arg(long)]
        content_hash: Option<String>,
        #[arg(long)]
        pinned: bool,
    },
    Get { id: String },
    List { learning_id: String },
    Pin { id: String, #[arg(long)] unpin: bool },
    Status,
}

fn anchor_json(a: &LearningAnchor) -> serde_json::Value {
    json!({
        "id": a.id,
        "learning_id": a.learning_id,
        "anchor_type": a.anchor_type,
        "file_path": a.file_path,
        "symbol_fqname": a.symbol_fqname,
        "line_start": a.line_start,
        "line_end": a.line_end,
        "content_hash": a.content_hash,
        "status": a.status.to_string(),
        "pinned": a.pinned,
        "verified_at": a.verified_at.map(|d| d.to_rfc3339()),
    })
}

pub async fn run_anchors(kernel: &Kernel, json_mode: bool, command: AnchorCommands) -> CmdResult<()> {
    match command {
        AnchorCommands::Create {
            learning_id,
            anchor_type,
            file_path,
            symbol,
            line_start,
            line_end,
            content_hash,
            pinned,
        } => {
            let anchor = anchors::create(
                &kernel.pool,
                anchors::NewAnchorInput {
                    learning_id: &learning_id,
                    anchor_type: &anchor_type,
                    file_path: &file_path,
                    symbol_fqname: symbol.as_deref(),
                    line_start,
                    line_end,
                    content_hash: content_hash.as_deref(),
                    pinned,
                },
            )
            .await
            .map_err(CliError::from)?;
            let value = anchor_json(&anchor);
            emit(json_mode, &value, |_| println!("created anchor {}", anchor.id));
            Ok(())
        }
        AnchorCommands::Get { id } => {
            let anchor = anchors::get(&kernel.pool, &id).await.map_err(CliError::from)?;
            let value = anchor_json(&anchor);
            emit(json_mode, &value, |_| println!("{} -> {}:{:?}-{:?}", anchor.id, anchor.file_path, anchor.line_start, anchor.line_end));
            Ok(())
        }
        AnchorCommands::List { learning_id } => {
            let anchors = anchors::list_for_learning(&kernel.pool, &learning_id).await.map_err(CliError::from)?;
            let value: Vec<_> = anchors.iter().map(anchor_json).collect();
            emit(json_mode, &value, |_| {
                for a in &anchors {
                    println!("{} [{}] {}", a.id, a.status, a.file_path);
                }
            });
            Ok(())
        }
        AnchorCommands::Pin { id, unpin } => {
            anchors::set_pinned(&kernel.pool, &id, !unpin).await.map_err(CliError::from)?;
            if !json_mode {
                println!("{} pinned={}", id, !unpin);
            }
            Ok(())
        }
        AnchorCommands::Status => {
            let summary = anchors::status_summary(&kernel.pool).await.map_err(CliError::from)?;
            let value: Vec<_> = summary.iter().map(|s| json!({"status": s.status, "count": s.count})).collect();
            emit(json_mode, &value, |_| {
                for s in &summary {
                    println!("{}: {}", s.status, s.count);
                }
            });
            Ok(())
        }
    }
}
