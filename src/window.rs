//! 24-hour customer-service window evaluation.
//!
//! The WhatsApp Business Platform only allows free-form messages within
//! 24 hours of the contact's last inbound message; outside the window an
//! approved template must open the session first.
//!
//! Memory is consulted first and treated as authoritative — the hot path
//! (every outbound send) avoids a database round-trip. The durable table
//! is the fallback after a restart empties the store. A very recent
//! inbound not yet re-observed in memory can be missed right after a
//! restart; the conservative outcome is an unnecessary template open, not
//! a dropped delivery.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::inbox::InboxStore;
use crate::persistence::message_repo::MessageRepo;

/// Session window length in milliseconds.
pub const WINDOW_MS: i64 = 86_400_000;

/// Evaluates whether a contact is inside the 24h messaging window.
#[derive(Clone)]
pub struct WindowEvaluator {
    inbox: Arc<InboxStore>,
    repo: MessageRepo,
}

impl WindowEvaluator {
    /// Create an evaluator over the given store and repository.
    #[must_use]
    pub fn new(inbox: Arc<InboxStore>, repo: MessageRepo) -> Self {
        Self { inbox, repo }
    }

    /// Whether `wa_id` is inside the 24h window as of now.
    pub async fn is_in_window(&self, wa_id: &str) -> bool {
        self.is_in_window_at(wa_id, Utc::now().timestamp_millis())
            .await
    }

    /// Whether `wa_id` is inside the 24h window at `now_ms`.
    ///
    /// The boundary is strict: a message exactly 24h old is outside.
    pub async fn is_in_window_at(&self, wa_id: &str, now_ms: i64) -> bool {
        if let Some(item) = self.inbox.last_inbound(wa_id) {
            return now_ms - item.timestamp < WINDOW_MS;
        }

        // Memory miss: fall back to the durable table. Query errors are
        // treated as "no known inbound" so window evaluation degrades to
        // closed instead of failing the caller.
        match self.repo.last_inbound_ts(wa_id).await {
            Ok(Some(ts_ms)) => now_ms - ts_ms < WINDOW_MS,
            Ok(None) => false,
            Err(err) => {
                warn!(wa_id, %err, "inbound-timestamp lookup failed; treating window as closed");
                false
            }
        }
    }
}
