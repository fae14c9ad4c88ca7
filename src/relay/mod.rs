//! Message relay orchestration.
//!
//! One inbound chat message becomes one turn against the upstream agent:
//! resolve a credential, resolve (or open) the user's conversation, send the
//! message, classify the response fragments, and compose the reply. Consent
//! prompts are auto-approved through a bounded resend chain; sign-in cards
//! are rendered to plain text and appended.

pub mod classify;
pub mod signin;

pub use classify::{classify_fragments, ClassifiedTurn};
pub use signin::extract_signin_prompt;

use crate::auth::{ServiceTokenCache, TokenStore};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::sessions::{ConnectionRegistry, RegistryStats, UserSession};
use crate::upstream::AgentClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Replaces a consent chain once the approval has gone upstream.
pub const APPROVAL_SENT: &str =
    "I've sent your approval. You should receive a confirmation shortly.";

/// Used when a turn produced no usable fragments.
pub const NO_RESPONSE: &str = "I didn't get a response from the agent. Please try again.";

/// Fixed payload resent upstream to approve a consent request.
fn approval_payload() -> String {
    serde_json::json!({ "action": "Allow" }).to_string()
}

/// Drives chat turns end to end.
pub struct MessageOrchestrator {
    agent: Arc<dyn AgentClient>,
    registry: Arc<ConnectionRegistry>,
    tokens: Arc<TokenStore>,
    service: Arc<ServiceTokenCache>,
    config: RelayConfig,
}

impl MessageOrchestrator {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        tokens: Arc<TokenStore>,
        service: Arc<ServiceTokenCache>,
        config: RelayConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(agent.clone()));
        Self {
            agent,
            registry,
            tokens,
            service,
            config,
        }
    }

    /// The session registry, for janitor wiring and the health surface.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// The per-user token store, for sign-in completion and janitor wiring.
    pub fn token_store(&self) -> Arc<TokenStore> {
        self.tokens.clone()
    }

    /// Handle one inbound message and return the reply text.
    ///
    /// `credential` overrides the credential lookup when the caller already
    /// holds one for this request. Otherwise the user's cached token is
    /// used, falling back to the shared service credential.
    ///
    /// The turn runs under the configured deadline; a timeout abandons the
    /// conversation so the next message starts clean.
    pub async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
        credential: Option<&str>,
    ) -> Result<String, RelayError> {
        let credential = self.resolve_credential(user_id, credential).await?;

        let deadline = self.config.turn_timeout();
        match tokio::time::timeout(deadline, self.run_turn(user_id, text, &credential)).await {
            Ok(result) => result,
            Err(_) => {
                let waited_ms = deadline.as_millis() as u64;
                warn!(user = %user_id, waited_ms, "turn timed out, dropping session");
                self.registry.invalidate(user_id).await;
                Err(RelayError::TurnTimedOut { waited_ms })
            }
        }
    }

    /// Drop the user's conversation so their next message starts fresh.
    /// Returns whether a conversation existed.
    pub async fn reset(&self, user_id: &str) -> bool {
        info!(user = %user_id, "conversation reset requested");
        self.registry.invalidate(user_id).await
    }

    /// Snapshot of live sessions for the health surface.
    pub async fn stats(&self) -> RegistryStats {
        self.registry.stats().await
    }

    async fn resolve_credential(
        &self,
        user_id: &str,
        explicit: Option<&str>,
    ) -> Result<String, RelayError> {
        if let Some(credential) = explicit {
            return Ok(credential.to_string());
        }
        if let Some(credential) = self.tokens.get(user_id) {
            debug!(user = %user_id, "using cached user credential");
            return Ok(credential);
        }
        self.service.get_or_refresh().await
    }

    async fn run_turn(
        &self,
        user_id: &str,
        text: &str,
        credential: &str,
    ) -> Result<String, RelayError> {
        let session = self.registry.get_or_create(user_id, credential).await?;

        let fragments = self
            .agent
            .ask_question(&session.handle, &session.conversation_id, text)
            .await
            .map_err(RelayError::upstream)?;

        let turn = classify_fragments(&fragments);

        let mut reply = match turn.reply_text() {
            Some(reply) => reply,
            None if turn.consent.is_some() => {
                self.resolve_consent_chain(&session).await?;
                APPROVAL_SENT.to_string()
            }
            None => {
                debug!(user = %user_id, "turn produced no usable fragments");
                NO_RESPONSE.to_string()
            }
        };

        if let Some(card) = turn.signin.as_ref() {
            reply.push_str("\n\n");
            reply.push_str(&extract_signin_prompt(card));
        }

        self.registry.touch(user_id).await;
        Ok(reply)
    }

    /// Resend the approval until the agent stops asking for consent.
    ///
    /// Bounded by `consent_max_depth`; at zero remaining resends the turn
    /// fails closed. Text or sign-in fragments arriving in resend replies
    /// are discarded.
    async fn resolve_consent_chain(&self, session: &UserSession) -> Result<(), RelayError> {
        let payload = approval_payload();
        let mut remaining = self.config.consent_max_depth;

        loop {
            if remaining == 0 {
                warn!(
                    user = %session.user_id,
                    max_depth = self.config.consent_max_depth,
                    "consent chain did not converge"
                );
                return Err(RelayError::ConsentLoopExceeded {
                    max_depth: self.config.consent_max_depth,
                });
            }
            remaining -= 1;

            let fragments = self
                .agent
                .ask_question(&session.handle, &session.conversation_id, &payload)
                .await
                .map_err(RelayError::upstream)?;

            let follow_up = classify_fragments(&fragments);
            if !follow_up.texts.is_empty() || follow_up.signin.is_some() {
                debug!(user = %session.user_id, "discarding fragments from consent resend");
            }
            if follow_up.consent.is_none() {
                info!(user = %session.user_id, "consent approved");
                return Ok(());
            }
            debug!(user = %session.user_id, remaining, "agent asked for consent again");
        }
    }
}
