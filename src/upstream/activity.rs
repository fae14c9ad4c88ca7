//! Wire model for upstream response fragments.
//!
//! The upstream agent answers one question with an ordered sequence of
//! activities. Most are plain messages; two special shapes drive their own
//! sub-protocols: consent-request invokes and sign-in cards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity type of a plain message fragment.
pub const ACTIVITY_TYPE_MESSAGE: &str = "message";

/// Name tag identifying a consent-request fragment.
pub const CONSENT_REQUEST_NAME: &str = "ConsentRequest";

/// Attachment content type of a sign-in card.
pub const SIGNIN_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.signin";

/// Button action type that carries the sign-in link.
pub const SIGNIN_BUTTON_TYPE: &str = "signin";

/// One response fragment from the upstream agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Attachment carried by a fragment (cards, files).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
}

impl Activity {
    /// Plain message fragment carrying `text`.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            kind: ACTIVITY_TYPE_MESSAGE.to_string(),
            text: Some(text.into()),
            name: None,
            attachments: Vec::new(),
        }
    }

    pub fn is_message(&self) -> bool {
        self.kind == ACTIVITY_TYPE_MESSAGE
    }

    /// Whether the fragment carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn is_consent_request(&self) -> bool {
        self.name.as_deref() == Some(CONSENT_REQUEST_NAME)
    }

    /// Whether this is a textless message whose first attachment is a
    /// sign-in card.
    pub fn is_signin_card(&self) -> bool {
        self.is_message()
            && !self.has_text()
            && self
                .attachments
                .first()
                .is_some_and(|a| a.content_type == SIGNIN_CARD_CONTENT_TYPE)
    }
}
