//! Fragment classification for one chat turn.

use crate::upstream::Activity;

/// Buckets one turn's fragments resolve into before the reply is composed.
#[derive(Debug, Default)]
pub struct ClassifiedTurn {
    /// Text fragments in arrival order.
    pub texts: Vec<String>,
    /// First consent-request fragment of the turn, if any.
    pub consent: Option<Activity>,
    /// First sign-in card fragment of the turn, if any.
    pub signin: Option<Activity>,
}

impl ClassifiedTurn {
    /// The accumulated reply text, fragments joined by a single space.
    pub fn reply_text(&self) -> Option<String> {
        if self.texts.is_empty() {
            None
        } else {
            Some(self.texts.join(" "))
        }
    }
}

/// Sort a turn's fragments into buckets, preserving arrival order.
///
/// Checked per fragment in priority order: message text, then consent
/// request, then sign-in card. Duplicate consent or sign-in cards keep the
/// first seen; extras are logged and dropped. Anything unrecognized is
/// logged at debug and skipped.
pub fn classify_fragments(fragments: &[Activity]) -> ClassifiedTurn {
    let mut turn = ClassifiedTurn::default();

    for fragment in fragments {
        if fragment.is_message() && fragment.has_text() {
            if let Some(text) = fragment.text.as_deref() {
                turn.texts.push(text.to_string());
            }
        } else if fragment.is_consent_request() {
            if turn.consent.is_some() {
                tracing::warn!("duplicate consent request in one turn, keeping the first");
            } else {
                turn.consent = Some(fragment.clone());
            }
        } else if fragment.is_signin_card() {
            if turn.signin.is_some() {
                tracing::warn!("duplicate sign-in card in one turn, keeping the first");
            } else {
                turn.signin = Some(fragment.clone());
            }
        } else {
            tracing::debug!(kind = %fragment.kind, "ignoring fragment");
        }
    }

    turn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::activity::samples;

    #[test]
    fn collects_text_in_order() {
        let fragments = vec![
            Activity::message("first"),
            Activity::message("second"),
            Activity::message("third"),
        ];
        let turn = classify_fragments(&fragments);
        assert_eq!(turn.reply_text().as_deref(), Some("first second third"));
        assert!(turn.consent.is_none());
        assert!(turn.signin.is_none());
    }

    #[test]
    fn empty_turn_has_no_reply() {
        let turn = classify_fragments(&[]);
        assert_eq!(turn.reply_text(), None);
    }

    #[test]
    fn captures_consent_alongside_text() {
        let fragments = vec![Activity::message("done"), samples::consent_request()];
        let turn = classify_fragments(&fragments);
        assert_eq!(turn.reply_text().as_deref(), Some("done"));
        assert!(turn.consent.is_some());
    }

    #[test]
    fn first_consent_wins() {
        let first = samples::consent_request();
        let mut second = samples::consent_request();
        second.kind = "invoke-later".to_string();
        let turn = classify_fragments(&[first, second]);
        assert_eq!(turn.consent.as_ref().expect("consent captured").kind, "invoke");
        assert!(turn.reply_text().is_none());
    }

    #[test]
    fn first_signin_card_wins() {
        let fragments = vec![
            samples::signin_card("first card", "https://one.test"),
            samples::signin_card("second card", "https://two.test"),
        ];
        let turn = classify_fragments(&fragments);
        let card = turn.signin.expect("sign-in card captured");
        assert_eq!(
            card.attachments[0].content["text"].as_str(),
            Some("first card")
        );
    }

    #[test]
    fn unrecognized_fragments_are_skipped() {
        let typing = Activity {
            kind: "typing".to_string(),
            text: None,
            name: None,
            attachments: Vec::new(),
        };
        let turn = classify_fragments(&[typing]);
        assert!(turn.reply_text().is_none());
        assert!(turn.consent.is_none());
        assert!(turn.signin.is_none());
    }

    #[test]
    fn textless_message_without_card_is_skipped() {
        let empty = Activity {
            kind: "message".to_string(),
            text: Some("   ".to_string()),
            name: None,
            attachments: Vec::new(),
        };
        let turn = classify_fragments(&[empty]);
        assert!(turn.reply_text().is_none());
        assert!(turn.signin.is_none());
    }
}
