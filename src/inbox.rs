//! Process-wide in-memory inbox store.
//!
//! A single most-recent-first sequence of [`InboxItem`]s owned by the
//! server process. Constructed once at startup and injected into handlers;
//! tests construct their own instances. The store has no cross-process
//! consistency guarantee — horizontally scaled deployments would each hold
//! an independent sequence.

use std::sync::Mutex;

use tracing::info;

use crate::models::message::{Direction, InboxItem};

const DEFAULT_QUERY_LIMIT: usize = 50;
const MAX_QUERY_LIMIT: usize = 500;

/// Filter and pagination parameters for inbox queries.
#[derive(Debug, Clone, Default)]
pub struct InboxQuery {
    /// Maximum items returned (default 50, capped at 500).
    pub limit: Option<usize>,
    /// Items skipped from the head before collecting.
    pub offset: Option<usize>,
    /// Case-insensitive substring match against text, from, to, and name.
    pub q: Option<String>,
    /// Restrict to a single direction.
    pub direction: Option<Direction>,
    /// Restrict to a single sender contact.
    pub from: Option<String>,
    /// Only items with `timestamp >= since` (ms epoch).
    pub since: Option<i64>,
}

/// Result page for an inbox query.
#[derive(Debug, Clone)]
pub struct InboxPage {
    /// Total matching items before pagination.
    pub total: usize,
    /// The requested page, newest first.
    pub items: Vec<InboxItem>,
}

/// Most-recent-first sequence of message records.
#[derive(Debug, Default)]
pub struct InboxStore {
    items: Mutex<Vec<InboxItem>>,
}

impl InboxStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item at the head of the sequence.
    pub fn push(&self, item: InboxItem) {
        info!(
            direction = item.direction.as_str(),
            msg_type = %item.msg_type,
            from = item.from.as_deref().unwrap_or(""),
            to = item.to.as_deref().unwrap_or(""),
            "inbox push"
        );
        self.lock().insert(0, item);
    }

    /// Truncate the sequence to empty. Idempotent.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Most recent inbound item from `wa_id`, scanning from the head.
    #[must_use]
    pub fn last_inbound(&self, wa_id: &str) -> Option<InboxItem> {
        self.lock()
            .iter()
            .find(|item| {
                item.direction == Direction::Inbound && item.from.as_deref() == Some(wa_id)
            })
            .cloned()
    }

    /// Filtered, paginated view of the sequence, newest first.
    #[must_use]
    pub fn query(&self, query: &InboxQuery) -> InboxPage {
        let needle = query.q.as_ref().map(|q| q.to_lowercase());
        let items = self.lock();

        let matches: Vec<&InboxItem> = items
            .iter()
            .filter(|item| {
                if let Some(direction) = query.direction {
                    if item.direction != direction {
                        return false;
                    }
                }
                if let Some(ref from) = query.from {
                    if item.from.as_deref() != Some(from.as_str()) {
                        return false;
                    }
                }
                if let Some(since) = query.since {
                    if item.timestamp < since {
                        return false;
                    }
                }
                if let Some(ref needle) = needle {
                    return contains_needle(item, needle);
                }
                true
            })
            .collect();

        let total = matches.len();
        let offset = query.offset.unwrap_or(0);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(MAX_QUERY_LIMIT);

        let page = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        InboxPage { total, items: page }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<InboxItem>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn contains_needle(item: &InboxItem, needle: &str) -> bool {
    let fields = [
        item.text.as_deref(),
        item.from.as_deref(),
        item.to.as_deref(),
        item.name.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}
