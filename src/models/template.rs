//! Message-template model exposed by the template-listing endpoint.

use serde::{Deserialize, Serialize};

/// An approved message template as presented to admin UIs.
///
/// Flattened from the Graph API's `message_templates` response: the body
/// component's text becomes `body`, and its example values (when the
/// template was registered with samples) become `example`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiTemplate {
    /// Template name as registered in the business manager.
    pub name: String,
    /// Display label: the template name with underscores spaced out.
    pub label: String,
    /// Human-readable language (e.g. `es`, `en_US`).
    pub language: String,
    /// Exact language code to send the template with.
    pub lang_code: String,
    /// Body component text with `{{n}}` placeholders.
    pub body: Option<String>,
    /// Example substitution values for the body placeholders.
    #[serde(default)]
    pub example: Vec<String>,
    /// Review status reported by the platform (`APPROVED`, `PENDING`, ...).
    pub status: String,
}
