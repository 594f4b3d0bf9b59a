//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every server startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// Idempotent; safe to call on every startup.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS message (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    meta_message_id TEXT,
    wa_id           TEXT NOT NULL,
    direction       TEXT NOT NULL CHECK(direction IN ('inbound','outbound','status')),
    msg_type        TEXT NOT NULL,
    body            TEXT,
    ts_ms           INTEGER NOT NULL,
    raw             TEXT
);

CREATE INDEX IF NOT EXISTS idx_message_contact ON message(wa_id, direction, ts_ms);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
