//! Message repository for `SQLite` persistence.
//!
//! The durable table is a best-effort, lossy mirror: inbound messages and
//! outbound free-text sends are written here, status updates are not. It is
//! the fallback source for inbound-timestamp lookups after a restart.

use std::sync::Arc;

use crate::models::message::{Direction, StoredMessage};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for durable message rows.
#[derive(Clone)]
pub struct MessageRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct MessageRow {
    meta_message_id: Option<String>,
    wa_id: String,
    direction: String,
    msg_type: String,
    body: Option<String>,
    ts_ms: i64,
    raw: Option<String>,
}

impl MessageRow {
    fn into_message(self) -> Result<StoredMessage> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| AppError::Db(format!("invalid direction: {}", self.direction)))?;
        Ok(StoredMessage {
            meta_message_id: self.meta_message_id,
            wa_id: self.wa_id,
            direction,
            msg_type: self.msg_type,
            body: self.body,
            ts_ms: self.ts_ms,
            raw: self.raw,
        })
    }
}

impl MessageRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a durable message row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails. Callers on the send
    /// path treat this as non-fatal.
    pub async fn insert(&self, message: &StoredMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO message (meta_message_id, wa_id, direction, msg_type, body, ts_ms, raw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&message.meta_message_id)
        .bind(&message.wa_id)
        .bind(message.direction.as_str())
        .bind(&message.msg_type)
        .bind(&message.body)
        .bind(message.ts_ms)
        .bind(&message.raw)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Most recent inbound timestamp (ms) for a contact, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails. The window evaluator
    /// converts errors into "no known inbound".
    pub async fn last_inbound_ts(&self, wa_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT ts_ms FROM message
             WHERE wa_id = ?1 AND direction = 'inbound'
             ORDER BY ts_ms DESC
             LIMIT 1",
        )
        .bind(wa_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        Ok(row.map(|(ts,)| ts))
    }

    /// Fetch the most recent rows for a contact, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn recent_for_contact(&self, wa_id: &str, limit: i64) -> Result<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT meta_message_id, wa_id, direction, msg_type, body, ts_ms, raw
             FROM message
             WHERE wa_id = ?1
             ORDER BY ts_ms DESC
             LIMIT ?2",
        )
        .bind(wa_id)
        .bind(limit)
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Purge rows older than `before_ts_ms`.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_before(&self, before_ts_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message WHERE ts_ms < ?1")
            .bind(before_ts_ms)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
