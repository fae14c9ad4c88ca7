//! Sign-in card extraction.
//!
//! When the upstream agent needs the user to authenticate it sends a card
//! instead of text. The card is rendered down to a plain prompt with the
//! sign-in link inlined, suitable for any chat surface.

use crate::upstream::activity::{Activity, SIGNIN_BUTTON_TYPE, SIGNIN_CARD_CONTENT_TYPE};

/// Shown when the fragment carries no usable sign-in attachment.
pub const SIGNIN_LINK_NOT_FOUND: &str =
    "I could not find the sign-in link. Please try again later.";

/// Shown when the card parses but carries no sign-in button.
pub const SIGNIN_LINK_MISSING: &str =
    "The sign-in link is missing from the card. Please contact support.";

/// Prompt used when the card itself has no text.
const DEFAULT_SIGNIN_PROMPT: &str = "Please sign in to continue.";

/// Compose the user-facing sign-in prompt from a sign-in fragment.
///
/// Never fails: malformed cards degrade to a fixed message instead of an
/// error.
pub fn extract_signin_prompt(fragment: &Activity) -> String {
    let Some(attachment) = fragment.attachments.first() else {
        tracing::warn!("sign-in fragment has no attachments");
        return SIGNIN_LINK_NOT_FOUND.to_string();
    };
    if attachment.content_type != SIGNIN_CARD_CONTENT_TYPE {
        tracing::warn!(
            content_type = %attachment.content_type,
            "first attachment is not a sign-in card"
        );
        return SIGNIN_LINK_NOT_FOUND.to_string();
    }

    let card = &attachment.content;
    let prompt = card
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or(DEFAULT_SIGNIN_PROMPT);

    let link = card
        .get("buttons")
        .and_then(|b| b.as_array())
        .and_then(|buttons| {
            buttons
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some(SIGNIN_BUTTON_TYPE))
        })
        .and_then(|button| button.get("value"))
        .and_then(|v| v.as_str());

    match link {
        Some(link) => format!("{prompt}\n\nClick here to sign in: {link}"),
        None => {
            tracing::warn!("sign-in card has no sign-in button");
            SIGNIN_LINK_MISSING.to_string()
        }
    }
}
