//! HTTP surface: axum router, shared state, and error mapping.

pub mod inbox;
pub mod messages;
pub mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::dispatch::Dispatcher;
use crate::graph::GraphClient;
use crate::inbox::InboxStore;
use crate::persistence::message_repo::MessageRepo;
use crate::window::WindowEvaluator;
use crate::{AppError, Result};

/// Shared application state injected into every handler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Process-wide in-memory inbox.
    pub inbox: Arc<InboxStore>,
    /// Durable message repository.
    pub repo: MessageRepo,
    /// 24h window evaluator.
    pub window: WindowEvaluator,
    /// Graph API client.
    pub graph: GraphClient,
    /// Outbound dispatcher.
    pub dispatcher: Dispatcher,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_)
            | Self::Db(_)
            | Self::Graph { .. }
            | Self::Webhook(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
async fn health() -> &'static str {
    "ok"
}

/// Build the application router over shared state.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/whatsapp/messages",
            post(messages::send).get(messages::list_templates),
        )
        .route(
            "/api/whatsapp/webhook",
            get(webhook::verify).post(webhook::ingest),
        )
        .route(
            "/api/whatsapp/inbox",
            get(inbox::query)
                .delete(inbox::clear)
                .post(inbox::debug_push),
        )
        .with_state(state)
}

/// Serve the HTTP API on `config.http_port` until cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let port = state.config.http_port;
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;

    info!(%bind, "starting HTTP transport");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP transport shut down");
    Ok(())
}
