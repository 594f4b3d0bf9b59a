//! Low-level Graph API client.
//!
//! Handles authenticated requests for sending text and template messages
//! and listing approved message templates. Non-2xx responses are parsed
//! into the platform's `error.code` / `error.message` pair so the
//! dispatcher's fallback chain can act on them.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::WhatsAppConfig;
use crate::models::template::UiTemplate;
use crate::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Receipt for an accepted outbound send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Platform message id (wamid), when present in the response.
    pub message_id: Option<String>,
    /// Full platform response body.
    pub raw: Value,
}

/// Structured error body returned by the Graph API.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<i64>,
}

/// Authenticated Graph API client bound to one business phone number.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    phone_number_id: String,
    waba_id: String,
    access_token: String,
}

impl GraphClient {
    /// Create a client from platform configuration.
    #[must_use]
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.graph_api_url.trim_end_matches('/').to_owned(),
            phone_number_id: config.phone_number_id.clone(),
            waba_id: config.waba_id.clone(),
            access_token: config.access_token.clone(),
        }
    }

    /// Send a free-form text message, optionally quoting `reply_to`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Graph` when the platform rejects the send or the
    /// request fails at the transport level.
    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
        reply_to: Option<&str>,
    ) -> Result<SendReceipt> {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "body": body }
        });
        if let Some(reply_to) = reply_to {
            payload["context"] = json!({ "message_id": reply_to });
        }
        self.post_messages(&payload).await
    }

    /// Send a template message with body text parameters.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Graph` when the platform rejects the send (e.g.
    /// template not approved for the requested language).
    pub async fn send_template(
        &self,
        to: &str,
        name: &str,
        language: &str,
        variables: &[String],
    ) -> Result<SendReceipt> {
        let mut template = json!({
            "name": name,
            "language": { "code": language }
        });
        if !variables.is_empty() {
            let parameters: Vec<Value> = variables
                .iter()
                .map(|text| json!({ "type": "text", "text": text }))
                .collect();
            template["components"] = json!([{ "type": "body", "parameters": parameters }]);
        }

        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "template",
            "template": template
        });
        self.post_messages(&payload).await
    }

    /// List the business account's message templates, flattened for UIs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Graph` if the listing request fails.
    pub async fn list_templates(&self) -> Result<Vec<UiTemplate>> {
        let url = format!(
            "{}/{}/message_templates?fields=name,status,language,components&limit=100",
            self.base_url, self.waba_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "template listing failed");
            return Err(parse_api_error(status, &body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|err| AppError::graph(format!("invalid template listing body: {err}")))?;

        let templates = body["data"]
            .as_array()
            .map(|data| data.iter().filter_map(flatten_template).collect())
            .unwrap_or_default();
        Ok(templates)
    }

    /// POST to the phone number's `/messages` endpoint.
    async fn post_messages(&self, payload: &Value) -> Result<SendReceipt> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        debug!(msg_type = payload["type"].as_str().unwrap_or(""), "graph api POST /messages");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, "graph api send rejected");
            return Err(parse_api_error(status, &body));
        }

        let raw: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let message_id = raw["messages"][0]["id"].as_str().map(str::to_owned);
        Ok(SendReceipt { message_id, raw })
    }
}

/// Map a non-2xx response body to `AppError::Graph`, preferring the
/// platform's structured error when the body parses.
fn parse_api_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiError>(body).ok().and_then(|e| e.error);
    match detail {
        Some(detail) => AppError::Graph {
            code: detail.code,
            message: detail.message,
        },
        None => AppError::graph(format!("status {status}: {body}")),
    }
}

/// Flatten one `message_templates` entry into a [`UiTemplate`].
///
/// Entries without a name are skipped.
fn flatten_template(entry: &Value) -> Option<UiTemplate> {
    let name = entry["name"].as_str()?.to_owned();
    let language = entry["language"].as_str().unwrap_or("").to_owned();
    let status = entry["status"].as_str().unwrap_or("UNKNOWN").to_owned();

    let body_component = entry["components"]
        .as_array()
        .and_then(|components| {
            components
                .iter()
                .find(|c| c["type"].as_str().unwrap_or("").eq_ignore_ascii_case("body"))
        });
    let body = body_component
        .and_then(|c| c["text"].as_str())
        .map(str::to_owned);
    let example = body_component
        .and_then(|c| c["example"]["body_text"][0].as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Some(UiTemplate {
        label: name.replace('_', " "),
        lang_code: language.clone(),
        name,
        language,
        body,
        example,
        status,
    })
}
