//! Anchor service: pins from a learning to a code location, used to
//! detect drift. The invalidation log is append-only — `set_status` only
//! ever adds a new observation, never rewrites history.

use chrono::Utc;
use sqlx::SqlitePool;

use tx_db::models::{AnchorInvalidation, AnchorStatus, LearningAnchor};
use tx_db::queries::anchors as db;

use crate::errors::{Error, Result};
use crate::ids;

pub struct NewAnchorInput<'a> {
    pub learning_id: &'a str,
    pub anchor_type: &'a str,
    pub file_path: &'a str,
    pub symbol_fqname: Option<&'a str>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub content_hash: Option<&'a str>,
    pub pinned: bool,
}

pub async fn create(pool: &SqlitePool, input: NewAnchorInput<'_>) -> Result<LearningAnchor> {
    let id = ids::anchor_id();
    let new_anchor = db::NewAnchor {
        id: &id,
        learning_id: input.learning_id,
        anchor_type: input.anchor_type,
        file_path: input.file_path,
        symbol_fqname: input.symbol_fqname,
        line_start: input.line_start,
        line_end: input.line_end,
        content_hash: input.content_hash,
        pinned: input.pinned,
    };
    Ok(db::insert_anchor(pool, &new_anchor).await?)
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<LearningAnchor> {
    db::get_anchor(pool, id).await?.ok_or_else(|| Error::AnchorNotFound(id.to_string()))
}

pub async fn list_for_learning(pool: &SqlitePool, learning_id: &str) -> Result<Vec<LearningAnchor>> {
    Ok(db::list_for_learning(pool, learning_id).await?)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<LearningAnchor>> {
    Ok(db::list_all(pool).await?)
}

/// Record a new verification observation: `valid` (content hash still
/// matches), `drifted` (location found but content changed), or
/// `invalid` (location no longer exists). The anchor row's own
/// status/verified_at columns reflect only the latest observation; every
/// observation is additionally appended to the anchor_invalidations log,
/// which is never rewritten.
pub async fn record_verification(pool: &SqlitePool, id: &str, status: AnchorStatus) -> Result<()> {
    let rows = db::set_status(pool, id, status, Utc::now()).await?;
    if rows == 0 {
        return Err(Error::AnchorNotFound(id.to_string()));
    }
    Ok(())
}

pub async fn list_invalidations(pool: &SqlitePool, anchor_id: &str) -> Result<Vec<AnchorInvalidation>> {
    Ok(db::list_invalidations(pool, anchor_id).await?)
}

pub async fn set_pinned(pool: &SqlitePool, id: &str, pinned: bool) -> Result<()> {
    let rows = db::set_pinned(pool, id, pinned).await?;
    if rows == 0 {
        return Err(Error::AnchorNotFound(id.to_string()));
    }
    Ok(())
}

pub struct StatusSummary {
    pub status: String,
    pub count: i64,
}

pub async fn status_summary(pool: &SqlitePool) -> Result<Vec<StatusSummary>> {
    let rows = db::status_summary(pool).await?;
    Ok(rows.into_iter().map(|(status, count)| StatusSummary { status, count }).collect())
}
