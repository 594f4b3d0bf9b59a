//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Graph API rejection, carrying the platform error code when present.
    Graph {
        /// Platform error code (`error.code` in the Graph API response body).
        code: Option<i64>,
        /// Human-readable platform error message.
        message: String,
    },
    /// Webhook payload failed verification or could not be processed.
    Webhook(String),
    /// Caller supplied an invalid or incomplete request.
    BadRequest(String),
    /// Caller is not authorized to perform the requested action.
    Forbidden(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build a Graph error without a platform code (transport-level failure).
    #[must_use]
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph {
            code: None,
            message: message.into(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Graph {
                code: Some(code),
                message,
            } => write!(f, "graph api ({code}): {message}"),
            Self::Graph {
                code: None,
                message,
            } => write!(f, "graph api: {message}"),
            Self::Webhook(msg) => write!(f, "webhook: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::graph(err.to_string())
    }
}
