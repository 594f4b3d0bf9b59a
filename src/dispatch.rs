//! Outbound message dispatch with session-window gating.
//!
//! Sends template or free-form text messages, transparently opening the
//! 24h session window with a template when it is closed. Template sends
//! run through an ordered fallback chain — requested template, same
//! template forced to `en_US`, then the universal `hello_world` template —
//! tried in sequence by a single combinator.
//!
//! There is no per-contact mutual exclusion: two concurrent sends to the
//! same contact may both observe a closed window and both open a session
//! template. Acceptable at admin-tool volume; a horizontally scaled
//! deployment would need external coordination.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::graph::{GraphClient, SendReceipt};
use crate::inbox::InboxStore;
use crate::models::message::{InboxItem, StoredMessage};
use crate::persistence::message_repo::MessageRepo;
use crate::window::WindowEvaluator;
use crate::{AppError, Result};

/// Template presumed approved on every business account.
pub const FALLBACK_TEMPLATE: &str = "hello_world";
/// Language of the universal fallback template.
pub const FALLBACK_LANGUAGE: &str = "en_US";

fn default_true() -> bool {
    true
}

/// Outbound send request, as accepted by `POST /api/whatsapp/messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Destination contact id (`wa_id`). Required.
    #[serde(default)]
    pub to: String,
    /// Free-form text to deliver inside the session window.
    #[serde(default)]
    pub text: Option<String>,
    /// Force the explicit-template branch even without a template name.
    #[serde(default)]
    pub force_template: bool,
    /// Explicit template to send instead of free text.
    #[serde(default)]
    pub template_name: Option<String>,
    /// Language for the explicit template.
    #[serde(default)]
    pub language_code: Option<String>,
    /// Body text parameters for the explicit template.
    #[serde(default)]
    pub variables: Vec<String>,
    /// Explicit window override: `Some(true)` always opens a session
    /// template first, `Some(false)` never does. Wins over `auto_session`.
    #[serde(default)]
    pub ensure_session: Option<bool>,
    /// When set (the default), the window is checked and a session
    /// template is opened automatically if it is closed.
    #[serde(default = "default_true")]
    pub auto_session: bool,
    /// Session-opening template override.
    #[serde(default)]
    pub session_template: Option<String>,
    /// Session-opening template language override.
    #[serde(default)]
    pub session_language: Option<String>,
    /// Message id to quote when sending the text as a reply.
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Which path a dispatched send took.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SendStep {
    /// Requested template sent at the requested language.
    #[serde(rename = "template")]
    Template,
    /// Requested template sent after forcing `en_US`.
    #[serde(rename = "template_fallback_en_US")]
    TemplateFallbackEnUs,
    /// Universal `hello_world` template sent after all retries failed.
    #[serde(rename = "hello_world_fallback")]
    HelloWorldFallback,
    /// Session template opened, then the text delivered.
    #[serde(rename = "template_then_text")]
    TemplateThenText,
    /// Window was open; text delivered directly.
    #[serde(rename = "text_only")]
    TextOnly,
    /// Session template opened and no text was supplied.
    #[serde(rename = "session_template_only")]
    SessionTemplateOnly,
    /// Nothing to send: no text and no window to open.
    #[serde(rename = "no_content")]
    NoContent,
}

/// Template actually used by a successful template send.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UsedTemplate {
    /// Template name.
    pub name: String,
    /// Language code the send succeeded with.
    pub language: String,
}

/// Structured result of a dispatched send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    /// Which path the send took.
    pub step: SendStep,
    /// Template used, for explicit-template sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<UsedTemplate>,
    /// Raw platform response for explicit-template sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Raw platform response for the session-opening template, when one
    /// was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_opened: Option<Value>,
    /// Raw platform response for the free-text send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_message: Option<Value>,
}

/// One entry in a template fallback chain.
struct TemplateCandidate {
    name: String,
    language: String,
    variables: Vec<String>,
    step: SendStep,
}

/// Outbound dispatcher over the window evaluator and Graph client.
#[derive(Clone)]
pub struct Dispatcher {
    inbox: Arc<InboxStore>,
    repo: MessageRepo,
    window: WindowEvaluator,
    graph: GraphClient,
    session_template: String,
    session_language: String,
}

impl Dispatcher {
    /// Create a dispatcher with the configured session-opening template.
    #[must_use]
    pub fn new(
        inbox: Arc<InboxStore>,
        repo: MessageRepo,
        window: WindowEvaluator,
        graph: GraphClient,
        session_template: String,
        session_language: String,
    ) -> Self {
        Self {
            inbox,
            repo,
            window,
            graph,
            session_template,
            session_language,
        }
    }

    /// Dispatch an outbound send request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when the destination is missing, or
    /// `AppError::Graph` when every fallback layer was exhausted.
    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome> {
        if request.to.is_empty() {
            return Err(AppError::BadRequest("missing destination contact id".into()));
        }

        let need_ensure = match request.ensure_session {
            Some(explicit) => explicit,
            None if request.auto_session => !self.window.is_in_window(&request.to).await,
            None => false,
        };

        if request.force_template || request.template_name.is_some() {
            self.send_explicit_template(&request).await
        } else {
            self.send_auto(&request, need_ensure).await
        }
    }

    /// Branch A: explicit template requested.
    async fn send_explicit_template(&self, request: &SendRequest) -> Result<SendOutcome> {
        let name = request
            .template_name
            .clone()
            .unwrap_or_else(|| self.session_template.clone());
        let language = request
            .language_code
            .clone()
            .unwrap_or_else(|| self.session_language.clone());

        let candidates = vec![
            TemplateCandidate {
                name: name.clone(),
                language,
                variables: request.variables.clone(),
                step: SendStep::Template,
            },
            TemplateCandidate {
                name,
                language: FALLBACK_LANGUAGE.into(),
                variables: request.variables.clone(),
                step: SendStep::TemplateFallbackEnUs,
            },
            universal_candidate(SendStep::HelloWorldFallback),
        ];

        let (receipt, used) = self.try_candidates(&request.to, candidates).await?;
        self.record_template_send(request, &used, &receipt);

        Ok(SendOutcome {
            step: used.step,
            used: Some(UsedTemplate {
                name: used.name,
                language: used.language,
            }),
            data: Some(receipt.raw),
            template_opened: None,
            text_message: None,
        })
    }

    /// Branch B: free text with automatic session handling.
    async fn send_auto(&self, request: &SendRequest, need_ensure: bool) -> Result<SendOutcome> {
        let mut template_opened = None;
        if need_ensure {
            let candidates = vec![
                TemplateCandidate {
                    name: request
                        .session_template
                        .clone()
                        .unwrap_or_else(|| self.session_template.clone()),
                    language: request
                        .session_language
                        .clone()
                        .unwrap_or_else(|| self.session_language.clone()),
                    variables: Vec::new(),
                    step: SendStep::TemplateThenText,
                },
                universal_candidate(SendStep::TemplateThenText),
            ];
            let (receipt, _) = self.try_candidates(&request.to, candidates).await?;
            template_opened = Some(receipt.raw);
        }

        let Some(text) = request.text.as_deref().filter(|t| !t.is_empty()) else {
            let step = if template_opened.is_some() {
                SendStep::SessionTemplateOnly
            } else {
                SendStep::NoContent
            };
            return Ok(SendOutcome {
                step,
                used: None,
                data: None,
                template_opened,
                text_message: None,
            });
        };

        let receipt = self
            .graph
            .send_text(&request.to, text, request.reply_to.as_deref())
            .await?;
        info!(to = %request.to, "text message sent");

        let item = InboxItem::outbound(
            receipt.message_id.clone(),
            request.to.clone(),
            "text",
            text,
            Utc::now().timestamp_millis(),
        );
        self.inbox.push(item.clone());
        self.persist_best_effort(&item).await;

        Ok(SendOutcome {
            step: if template_opened.is_some() {
                SendStep::TemplateThenText
            } else {
                SendStep::TextOnly
            },
            used: None,
            data: None,
            template_opened,
            text_message: Some(receipt.raw),
        })
    }

    /// Try template candidates in order; the first success wins.
    ///
    /// Failures short of the last candidate are logged and skipped; the
    /// last candidate's failure propagates.
    async fn try_candidates(
        &self,
        to: &str,
        candidates: Vec<TemplateCandidate>,
    ) -> Result<(SendReceipt, TemplateCandidate)> {
        let mut last_err = AppError::graph("empty template candidate list");
        let total = candidates.len();
        for (index, candidate) in candidates.into_iter().enumerate() {
            match self
                .graph
                .send_template(to, &candidate.name, &candidate.language, &candidate.variables)
                .await
            {
                Ok(receipt) => {
                    info!(
                        to,
                        template = %candidate.name,
                        language = %candidate.language,
                        "template sent"
                    );
                    return Ok((receipt, candidate));
                }
                Err(err) => {
                    if index + 1 < total {
                        warn!(
                            to,
                            template = %candidate.name,
                            language = %candidate.language,
                            %err,
                            "template send failed; trying next candidate"
                        );
                    }
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Record a successful explicit-template send in the inbox store.
    fn record_template_send(
        &self,
        request: &SendRequest,
        used: &TemplateCandidate,
        receipt: &SendReceipt,
    ) {
        let mut label = format!("[TPL] {}/{}", used.name, used.language);
        for variable in &used.variables {
            label.push_str(" | ");
            label.push_str(variable);
        }
        self.inbox.push(InboxItem::outbound(
            receipt.message_id.clone(),
            request.to.clone(),
            "template",
            label,
            Utc::now().timestamp_millis(),
        ));
    }

    /// Mirror an outbound item into the durable table; failure is logged,
    /// never surfaced to the caller.
    async fn persist_best_effort(&self, item: &InboxItem) {
        let Some(stored) = StoredMessage::from_item(item) else {
            return;
        };
        if let Err(err) = self.repo.insert(&stored).await {
            warn!(%err, "durable insert failed for outbound message");
        }
    }
}

fn universal_candidate(step: SendStep) -> TemplateCandidate {
    TemplateCandidate {
        name: FALLBACK_TEMPLATE.into(),
        language: FALLBACK_LANGUAGE.into(),
        variables: Vec::new(),
        step,
    }
}
