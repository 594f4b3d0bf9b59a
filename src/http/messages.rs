//! Outbound send and template-listing endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::dispatch::SendRequest;
use crate::AppError;

use super::AppState;

/// Handle `POST /api/whatsapp/messages` — dispatch an outbound send.
///
/// Missing destination yields 400; an exhausted template fallback chain
/// yields 500 carrying the last platform error.
///
/// # Errors
///
/// Returns `AppError` mapped to an HTTP status by the router.
pub async fn send(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.dispatcher.send(request).await.map_err(|err| {
        error!(%err, "outbound dispatch failed");
        err
    })?;

    let mut body = serde_json::to_value(&outcome)
        .map_err(|err| AppError::Io(format!("failed to serialize outcome: {err}")))?;
    body["success"] = json!(true);
    Ok(Json(body))
}

/// Handle `GET /api/whatsapp/messages` — list approved templates.
///
/// # Errors
///
/// Returns `AppError::Graph` when the platform listing call fails.
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let templates = state.graph.list_templates().await?;
    Ok(Json(json!({ "templates": templates })))
}
