//! Inbox query, clear, and debug-push endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::inbox::InboxQuery;
use crate::models::message::{Direction, InboxItem};
use crate::AppError;

use super::AppState;

/// Query-string parameters for `GET /api/whatsapp/inbox`.
#[derive(Debug, Deserialize)]
pub struct InboxParams {
    limit: Option<usize>,
    offset: Option<usize>,
    q: Option<String>,
    direction: Option<String>,
    from: Option<String>,
    since: Option<i64>,
}

/// Handle `GET /api/whatsapp/inbox` — filtered, paginated, newest first.
///
/// The response is marked `Cache-Control: no-store`: the inbox is live
/// operational state, not cacheable content.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InboxParams>,
) -> Response {
    let query = InboxQuery {
        limit: params.limit,
        offset: params.offset,
        q: params.q.filter(|q| !q.is_empty()),
        direction: params.direction.as_deref().and_then(Direction::parse),
        from: params.from.filter(|f| !f.is_empty()),
        since: params.since,
    };
    let page = state.inbox.query(&query);

    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(json!({ "total": page.total, "items": page.items })),
    )
        .into_response()
}

/// Handle `DELETE /api/whatsapp/inbox` — empty the in-memory store.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.inbox.clear();
    Json(json!({ "ok": true }))
}

/// Body for the synthetic debug push.
#[derive(Debug, Deserialize)]
pub struct DebugPush {
    from: String,
    text: String,
    name: Option<String>,
    timestamp: Option<i64>,
}

/// Handle `POST /api/whatsapp/inbox` — inject a synthetic inbound item.
///
/// Only available when `debug_endpoints` is enabled in configuration;
/// returns 403 otherwise.
///
/// # Errors
///
/// Returns `AppError::Forbidden` outside of debug mode.
pub async fn debug_push(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DebugPush>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.config.debug_endpoints {
        return Err(AppError::Forbidden("debug endpoints are disabled".into()));
    }

    state.inbox.push(InboxItem {
        id: None,
        direction: Direction::Inbound,
        timestamp: body.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        from: Some(body.from),
        to: None,
        name: body.name,
        msg_type: "text".into(),
        text: Some(body.text),
        media_id: None,
        media_type: None,
        file_name: None,
        raw: None,
    });
    Ok(Json(json!({ "ok": true })))
}
