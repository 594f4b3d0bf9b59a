//! Retention service for time-based data purge.
//!
//! Runs as a background task deleting durable message rows older than
//! `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::message_repo::MessageRepo;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

const DAY_MS: i64 = 86_400_000;

/// Spawn the retention purge background task.
///
/// The task runs hourly; each tick deletes message rows older than
/// `retention_days`.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db, retention_days).await {
                        error!(%err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Delete message rows older than the retention horizon.
///
/// # Errors
///
/// Returns `AppError::Db` if the delete fails.
pub async fn purge(db: &Arc<Database>, retention_days: u32) -> Result<u64> {
    let cutoff = Utc::now().timestamp_millis() - i64::from(retention_days) * DAY_MS;
    let repo = MessageRepo::new(Arc::clone(db));
    let deleted = repo.purge_before(cutoff).await?;
    if deleted > 0 {
        info!(deleted, retention_days, "purged expired message rows");
    }
    Ok(deleted)
}
