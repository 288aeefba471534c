use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::OutboxMessage;

pub struct NewMessage<'a> {
    pub channel: &'a str,
    pub sender: &'a str,
    pub content: &'a str,
    pub correlation_id: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub metadata: &'a str,
    pub now: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn send(pool: &SqlitePool, new_message: &NewMessage<'_>) -> Result<OutboxMessage, sqlx::Error> {
    sqlx::query_as::<_, OutboxMessage>(
        "INSERT INTO outbox_messages (channel, sender, content, status, correlation_id, task_id, metadata, created_at, expires_at) \
         VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?) \
         RETURNING *",
    )
    .bind(new_message.channel)
    .bind(new_message.sender)
    .bind(new_message.content)
    .bind(new_message.correlation_id)
    .bind(new_message.task_id)
    .bind(new_message.metadata)
    .bind(new_message.now)
    .bind(new_message.expires_at)
    .fetch_one(pool)
    .await
}

pub struct InboxFilter<'a> {
    pub channel: &'a str,
    pub after_id: i64,
    pub limit: i64,
    pub sender: Option<&'a str>,
    pub correlation_id: Option<&'a str>,
    pub include_acked: bool,
    pub now: DateTime<Utc>,
}

pub async fn inbox(pool: &SqlitePool, filter: &InboxFilter<'_>) -> Result<Vec<OutboxMessage>, sqlx::Error> {
    let query = format!(
        "SELECT * FROM outbox_messages \
         WHERE channel = ? AND id > ? \
           AND (expires_at IS NULL OR expires_at > ?) \
           {} \
           {} \
           {} \
         ORDER BY id ASC \
         LIMIT ?",
        if filter.include_acked { "" } else { "AND status = 'pending'" },
        if filter.sender.is_some() { "AND sender = ?" } else { "" },
        if filter.correlation_id.is_some() { "AND correlation_id = ?" } else { "" },
    );
    let mut q = sqlx::query_as::<_, OutboxMessage>(&query)
        .bind(filter.channel)
        .bind(filter.after_id)
        .bind(filter.now);
    if let Some(sender) = filter.sender {
        q = q.bind(sender);
    }
    if let Some(correlation_id) = filter.correlation_id {
        q = q.bind(correlation_id);
    }
    q = q.bind(filter.limit);
    q.fetch_all(pool).await
}

/// Transitions `pending -> acked`. Returns `None` if the message does not
/// exist or is already acked (double-ack maps to `MessageAlreadyAcked` at
/// the service layer by distinguishing "no such id" via a prior lookup).
pub async fn ack(pool: &SqlitePool, id: i64, acked_at: DateTime<Utc>) -> Result<Option<OutboxMessage>, sqlx::Error> {
    sqlx::query_as::<_, OutboxMessage>(
        "UPDATE outbox_messages SET status = 'acked', acked_at = ? \
         WHERE id = ? AND status = 'pending' \
         RETURNING *",
    )
    .bind(acked_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn ack_all(pool: &SqlitePool, channel: &str, acked_at: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE outbox_messages SET status = 'acked', acked_at = ? WHERE channel = ? AND status = 'pending'",
    )
    .bind(acked_at)
    .bind(channel)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn pending_count(pool: &SqlitePool, channel: &str, now: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM outbox_messages \
         WHERE channel = ? AND status = 'pending' AND (expires_at IS NULL OR expires_at > ?)",
    )
    .bind(channel)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn find_replies(pool: &SqlitePool, correlation_id: &str) -> Result<Vec<OutboxMessage>, sqlx::Error> {
    sqlx::query_as::<_, OutboxMessage>(
        "SELECT * FROM outbox_messages WHERE correlation_id = ? ORDER BY id ASC",
    )
    .bind(correlation_id)
    .fetch_all(pool)
    .await
}

pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Option<OutboxMessage>, sqlx::Error> {
    sqlx::query_as::<_, OutboxMessage>("SELECT * FROM outbox_messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub struct GcResult {
    pub expired: u64,
    pub acked: u64,
}

/// Deletes expired rows outright, plus acked rows older than the
/// threshold (`acked_older_than_hours = 0` deletes all acked rows,
/// regardless of how recently they were acked).
pub async fn gc(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    acked_older_than_hours: i64,
) -> Result<GcResult, sqlx::Error> {
    let expired = sqlx::query(
        "DELETE FROM outbox_messages WHERE expires_at IS NOT NULL AND expires_at <= ?",
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let cutoff = now - chrono::Duration::hours(acked_older_than_hours);
    let acked = sqlx::query(
        "DELETE FROM outbox_messages WHERE status = 'acked' AND acked_at IS NOT NULL AND acked_at <= ?",
    )
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(GcResult { expired, acked })
}
