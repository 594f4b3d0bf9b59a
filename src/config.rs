//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

fn default_graph_api_url() -> String {
    "https://graph.facebook.com/v21.0".into()
}

fn default_session_template() -> String {
    "hello_world".into()
}

fn default_session_language() -> String {
    "en_US".into()
}

fn default_http_port() -> u16 {
    3000
}

fn default_retention_days() -> u32 {
    90
}

fn default_db_path() -> PathBuf {
    PathBuf::from("wa-relay.db")
}

/// Nested WhatsApp Business platform configuration.
///
/// Tokens are loaded at runtime from environment variables, never from the
/// TOML config file or source literals.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WhatsAppConfig {
    /// Business phone number id the service sends from.
    pub phone_number_id: String,
    /// Business account id used for template listing.
    pub waba_id: String,
    /// Graph API base URL; overridable for tests.
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,
    /// Template used to open a closed 24h session window.
    #[serde(default = "default_session_template")]
    pub session_template: String,
    /// Language code for the session-opening template.
    #[serde(default = "default_session_language")]
    pub session_language: String,
    /// Bearer token for the Graph API (populated at runtime).
    #[serde(skip)]
    pub access_token: String,
    /// Webhook verification token (populated at runtime).
    #[serde(skip)]
    pub verify_token: String,
    /// Optional app secret for webhook signature checks (populated at runtime).
    #[serde(skip)]
    pub app_secret: Option<String>,
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// WhatsApp platform settings.
    pub whatsapp: WhatsAppConfig,
    /// HTTP port the service binds on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Path to the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Days before durable message rows are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Whether the synthetic inbox-push endpoint is enabled.
    ///
    /// Must stay off outside local development: the endpoint injects
    /// unauthenticated inbound records.
    #[serde(default)]
    pub debug_endpoints: bool,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load platform credentials from environment variables.
    ///
    /// `WA_ACCESS_TOKEN` and `WA_VERIFY_TOKEN` are required;
    /// `WA_APP_SECRET` is optional — without it, webhook signature
    /// verification is skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing.
    pub fn load_credentials(&mut self) -> Result<()> {
        self.whatsapp.access_token = require_env("WA_ACCESS_TOKEN")?;
        self.whatsapp.verify_token = require_env("WA_VERIFY_TOKEN")?;
        self.whatsapp.app_secret = env::var("WA_APP_SECRET").ok().filter(|s| !s.is_empty());
        if self.whatsapp.app_secret.is_none() {
            warn!("WA_APP_SECRET not set; webhook signatures will not be verified");
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.whatsapp.phone_number_id.is_empty() {
            return Err(AppError::Config(
                "whatsapp.phone_number_id must not be empty".into(),
            ));
        }
        if self.whatsapp.waba_id.is_empty() {
            return Err(AppError::Config("whatsapp.waba_id must not be empty".into()));
        }
        if self.whatsapp.session_template.is_empty() {
            return Err(AppError::Config(
                "whatsapp.session_template must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("credential {key} not set in environment")))
}
