//! Webhook verification handshake and payload ingestion.
//!
//! GET handles Meta's `hub.challenge` echo; POST normalizes inbound
//! webhook envelopes into [`InboxItem`]s. The POST handler always
//! acknowledges with HTTP 200 — the platform retries unacknowledged
//! deliveries aggressively, so internal processing failures must not
//! surface as errors.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::models::message::{Direction, InboxItem, StoredMessage};

use super::AppState;

/// Handle the GET verification handshake.
///
/// Echoes `hub.challenge` with 200 when `hub.mode` is `subscribe` and
/// `hub.verify_token` matches the configured secret; 403 otherwise.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map_or("", String::as_str);
    let token = params.get("hub.verify_token").map_or("", String::as_str);
    let challenge = params.get("hub.challenge").map_or("", String::as_str);

    let expected = state.config.whatsapp.verify_token.as_bytes();
    let token_ok = expected.len() == token.len()
        && bool::from(expected.ct_eq(token.as_bytes()));

    if mode == "subscribe" && token_ok {
        info!("webhook verification handshake accepted");
        return (StatusCode::OK, challenge.to_owned()).into_response();
    }

    warn!(mode, "webhook verification rejected");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "verification failed" })),
    )
        .into_response()
}

/// Handle a webhook POST delivery.
///
/// Verifies the `X-Hub-Signature-256` header when an app secret is
/// configured, then tolerantly walks `entry[].changes[].value` pushing
/// inbound and status items. Malformed fields never abort processing of
/// sibling messages, and the response is `{ ok: true }` regardless of
/// what was extracted.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref secret) = state.config.whatsapp.app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !signature_matches(secret, &body, signature) {
            warn!("webhook signature mismatch; payload dropped");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "invalid signature" })),
            )
                .into_response();
        }
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => process_envelope(&state, &payload).await,
        Err(err) => warn!(%err, "webhook body is not JSON; acknowledging anyway"),
    }

    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

/// Constant-time comparison of `sha256=<hex>` against the body HMAC.
fn signature_matches(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();
    computed.len() == provided.len() && bool::from(computed.ct_eq(&provided))
}

/// Walk the webhook envelope pushing inbound and status items.
async fn process_envelope(state: &Arc<AppState>, payload: &Value) {
    let entries = payload["entry"].as_array().cloned().unwrap_or_default();
    for entry in &entries {
        let changes = entry["changes"].as_array().cloned().unwrap_or_default();
        for change in &changes {
            let value = &change["value"];
            let contact_name = value["contacts"][0]["profile"]["name"]
                .as_str()
                .map(str::to_owned);

            if let Some(messages) = value["messages"].as_array() {
                for msg in messages {
                    let item = normalize_message(msg, contact_name.clone());
                    persist_inbound(state, &item).await;
                    state.inbox.push(item);
                }
            }

            if let Some(statuses) = value["statuses"].as_array() {
                for status in statuses {
                    state.inbox.push(normalize_status(status));
                }
            }
        }
    }
}

/// Mirror an inbound item into the durable table, best effort.
async fn persist_inbound(state: &Arc<AppState>, item: &InboxItem) {
    let Some(stored) = StoredMessage::from_item(item) else {
        return;
    };
    if let Err(err) = state.repo.insert(&stored).await {
        warn!(%err, "durable insert failed for inbound message");
    }
}

/// Normalize one inbound message into an [`InboxItem`].
pub(crate) fn normalize_message(msg: &Value, name: Option<String>) -> InboxItem {
    let msg_type = msg["type"].as_str().unwrap_or("unknown").to_owned();
    let (text, media_id, media_type, file_name) = summarize(msg, &msg_type);

    InboxItem {
        id: msg["id"].as_str().map(str::to_owned),
        direction: Direction::Inbound,
        timestamp: normalize_timestamp(&msg["timestamp"]),
        from: msg["from"].as_str().map(str::to_owned),
        to: None,
        name,
        msg_type,
        text,
        media_id,
        media_type,
        file_name,
        raw: Some(msg.clone()),
    }
}

/// Normalize one status update into a `status`-direction item.
pub(crate) fn normalize_status(status: &Value) -> InboxItem {
    let state_name = status["status"].as_str().unwrap_or("unknown");
    InboxItem {
        id: status["id"].as_str().map(str::to_owned),
        direction: Direction::Status,
        timestamp: normalize_timestamp(&status["timestamp"]),
        from: None,
        to: status["recipient_id"].as_str().map(str::to_owned),
        name: None,
        msg_type: "status".into(),
        text: Some(format!("status: {state_name}")),
        media_id: None,
        media_type: None,
        file_name: None,
        raw: Some(status.clone()),
    }
}

/// Platform timestamps arrive as either second- or millisecond-epoch
/// values, sometimes as strings. Values below 10^12 are seconds.
pub(crate) fn normalize_timestamp(raw: &Value) -> i64 {
    let value = raw
        .as_i64()
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0);
    if value > 0 && value < 1_000_000_000_000 {
        value * 1000
    } else {
        value
    }
}

/// Derive the human-readable summary and media descriptors per type.
fn summarize(
    msg: &Value,
    msg_type: &str,
) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    match msg_type {
        "text" => (
            msg["text"]["body"].as_str().map(str::to_owned),
            None,
            None,
            None,
        ),
        "image" | "audio" | "video" | "document" => {
            let media = &msg[msg_type];
            let caption = media["caption"].as_str();
            let file_name = media["filename"].as_str().map(str::to_owned);
            let summary = caption.map_or_else(
                || {
                    file_name.clone().map_or_else(
                        || format!("[{msg_type}]"),
                        |f| format!("[{msg_type}] {f}"),
                    )
                },
                |c| format!("[{msg_type}] {c}"),
            );
            (
                Some(summary),
                media["id"].as_str().map(str::to_owned),
                media["mime_type"].as_str().map(str::to_owned),
                file_name,
            )
        }
        "button" => (
            msg["button"]["text"]
                .as_str()
                .or_else(|| msg["button"]["payload"].as_str())
                .map(str::to_owned),
            None,
            None,
            None,
        ),
        "interactive" => {
            let interactive = &msg["interactive"];
            let selection = interactive["button_reply"]["title"]
                .as_str()
                .or_else(|| interactive["list_reply"]["title"].as_str());
            (selection.map(str::to_owned), None, None, None)
        }
        other => (Some(format!("[{other}]")), None, None, None),
    }
}
