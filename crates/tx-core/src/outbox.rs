//! Outbox service: inter-agent messaging with per-reader cursor
//! semantics. Fan-out is reader-driven — each caller advances its own
//! cursor via `afterId`; acking is a side effect on the message itself,
//! never on another reader's view of it.

use chrono::Utc;
use sqlx::SqlitePool;

use tx_db::models::OutboxMessage;
use tx_db::queries::outbox as db;

use crate::errors::{Error, Result};

pub struct SendInput<'a> {
    pub channel: &'a str,
    pub sender: &'a str,
    pub content: &'a str,
    pub correlation_id: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub metadata: &'a str,
    pub ttl_seconds: Option<i64>,
}

pub async fn send(pool: &SqlitePool, input: SendInput<'_>) -> Result<OutboxMessage> {
    if let Some(ttl) = input.ttl_seconds {
        if ttl < 0 {
            return Err(Error::ValidationError("ttlSeconds must not be negative".into()));
        }
    }
    let now = Utc::now();
    let expires_at = input.ttl_seconds.map(|ttl| now + chrono::Duration::seconds(ttl));
    let new_message = db::NewMessage {
        channel: input.channel,
        sender: input.sender,
        content: input.content,
        correlation_id: input.correlation_id,
        task_id: input.task_id,
        metadata: input.metadata,
        now,
        expires_at,
    };
    Ok(db::send(pool, &new_message).await?)
}

pub struct InboxQuery<'a> {
    pub channel: &'a str,
    pub after_id: i64,
    pub limit: i64,
    pub sender: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
    pub include_acked: bool,
}

pub async fn inbox(pool: &SqlitePool, query: InboxQuery<'_>) -> Result<Vec<OutboxMessage>> {
    let filter = db::InboxFilter {
        channel: query.channel,
        after_id: query.after_id,
        limit: query.limit,
        sender: query.sender,
        correlation_id: query.correlation_id,
        include_acked: query.include_acked,
        now: Utc::now(),
    };
    Ok(db::inbox(pool, &filter).await?)
}

pub async fn ack(pool: &SqlitePool, id: i64) -> Result<()> {
    let existing = db::get_message(pool, id).await?.ok_or(Error::MessageAlreadyAcked(id))?;
    if existing.acked_at.is_some() {
        return Err(Error::MessageAlreadyAcked(id));
    }
    db::ack(pool, id, Utc::now()).await?.ok_or(Error::MessageAlreadyAcked(id))?;
    Ok(())
}

pub async fn ack_all(pool: &SqlitePool, channel: &str) -> Result<u64> {
    Ok(db::ack_all(pool, channel, Utc::now()).await?)
}

pub async fn pending(pool: &SqlitePool, channel: &str) -> Result<i64> {
    Ok(db::pending_count(pool, channel, Utc::now()).await?)
}

pub async fn find_replies(pool: &SqlitePool, correlation_id: &str) -> Result<Vec<OutboxMessage>> {
    Ok(db::find_replies(pool, correlation_id).await?)
}

pub struct GcReport {
    pub expired: u64,
    pub acked: u64,
}

pub async fn gc(pool: &SqlitePool, acked_older_than_hours: i64) -> Result<GcReport> {
    let result = db::gc(pool, Utc::now(), acked_older_than_hours).await?;
    Ok(GcReport {
        expired: result.expired,
        acked: result.acked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tx_test_utils::create_test_db;

    #[tokio::test]
    async fn negative_ttl_is_rejected() {
        let db = create_test_db().await;
        let err = send(
            &db.pool,
            SendInput {
                channel: "general",
                sender: "worker-a",
                content: "hi",
                correlation_id: None,
                task_id: None,
                metadata: "{}",
                ttl_seconds: Some(-1),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "ValidationError");
    }

    #[tokio::test]
    async fn double_ack_fails() {
        let db = create_test_db().await;
        let message = send(
            &db.pool,
            SendInput {
                channel: "general",
                sender: "worker-a",
                content: "hi",
                correlation_id: None,
                task_id: None,
                metadata: "{}",
                ttl_seconds: None,
            },
        )
        .await
        .unwrap();

        ack(&db.pool, message.id).await.unwrap();
        let err = ack(&db.pool, message.id).await.unwrap_err();
        assert_eq!(err.code(), "MessageAlreadyAcked");
    }
}
