//! Message models: transient inbox items and durable message rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message record relative to the business account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Message received from a contact.
    Inbound,
    /// Message sent by this service.
    Outbound,
    /// Delivery-state update for a previously sent message.
    Status,
}

impl Direction {
    /// Stable string form used in the database and query filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Status => "status",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// A transient, in-memory message record.
///
/// Created by the webhook handler (inbound/status) or the dispatcher
/// (outbound) and held for the lifetime of the server process. Records are
/// insert-then-immutable: there is no update path after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxItem {
    /// External message identifier (wamid), when the platform supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record role: inbound, outbound, or status.
    pub direction: Direction,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Sender contact identifier (`wa_id` format) for inbound records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Destination contact identifier for outbound records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Display name of the contact, when the webhook carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message kind (`text`, `image`, `template`, `status`, ...).
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Human-readable summary of the message content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Platform media identifier, reserved for richer rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Media mime type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Original file name for document media.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Original payload, retained for debugging and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl InboxItem {
    /// Build an outbound record for a message this service just sent.
    #[must_use]
    pub fn outbound(
        id: Option<String>,
        to: impl Into<String>,
        msg_type: impl Into<String>,
        text: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            direction: Direction::Outbound,
            timestamp,
            from: None,
            to: Some(to.into()),
            name: None,
            msg_type: msg_type.into(),
            text: Some(text.into()),
            media_id: None,
            media_type: None,
            file_name: None,
            raw: None,
        }
    }
}

/// A durable message row: the best-effort `SQLite` mirror of inbound
/// messages and outbound free-text sends.
///
/// This table is the source of truth for inbound-timestamp lookups after
/// a process restart empties the in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    /// External message identifier (wamid), when known.
    pub meta_message_id: Option<String>,
    /// Contact identifier the row is keyed on.
    pub wa_id: String,
    /// Record role.
    pub direction: Direction,
    /// Message kind.
    pub msg_type: String,
    /// Message body or summary text.
    pub body: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub ts_ms: i64,
    /// Original payload serialized as JSON text.
    pub raw: Option<String>,
}

impl StoredMessage {
    /// Build a durable row from a transient inbox item.
    ///
    /// Returns `None` when the item carries no contact identifier to key
    /// the row on (inbound uses `from`, outbound uses `to`).
    #[must_use]
    pub fn from_item(item: &InboxItem) -> Option<Self> {
        let wa_id = match item.direction {
            Direction::Inbound => item.from.clone(),
            Direction::Outbound => item.to.clone(),
            Direction::Status => None,
        }?;
        Some(Self {
            meta_message_id: item.id.clone(),
            wa_id,
            direction: item.direction,
            msg_type: item.msg_type.clone(),
            body: item.text.clone(),
            ts_ms: item.timestamp,
            raw: item.raw.as_ref().map(std::string::ToString::to_string),
        })
    }
}
