//! Chat platform seam and reply delivery.
//!
//! The platform connector (implemented by the embedding process) only posts
//! and edits messages. [`deliver`] wraps one turn in the visible flow users
//! expect: a working indicator goes up immediately, then gets replaced by
//! the real reply once the turn settles.

use crate::relay::MessageOrchestrator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, error};

/// Posted while the turn is running, replaced by the reply.
pub const WORKING_INDICATOR: &str = "Working on it...";

/// Sent in place of internal error detail when a turn fails.
pub const TURN_FAILED: &str =
    "Something went wrong while handling your message. Please try again.";

/// Messaging surface of the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a new message and return its platform reference.
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage>;

    /// Replace the text of an existing message.
    async fn update_message(&self, channel: &str, message_id: &str, text: &str) -> Result<()>;
}

/// Reference to a message accepted by the platform.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub id: String,
    pub channel: String,
}

/// Run one turn and deliver its reply, working indicator first.
///
/// Indicator failures are not fatal: a failed initial post just means the
/// reply arrives as a fresh message, and a failed update falls back to a
/// fresh post. A failed turn is delivered as a generic apology; internal
/// error detail is logged, never sent. Returns the text that was delivered.
pub async fn deliver(
    orchestrator: &MessageOrchestrator,
    chat: &dyn ChatPlatform,
    channel: &str,
    user_id: &str,
    text: &str,
    credential: Option<&str>,
) -> Result<String> {
    let indicator = match chat.post_message(channel, WORKING_INDICATOR).await {
        Ok(posted) => Some(posted),
        Err(e) => {
            debug!(error = %e, "working indicator post failed, continuing without it");
            None
        }
    };

    let reply = match orchestrator.handle_message(user_id, text, credential).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(user = %user_id, error = %e, "turn failed");
            TURN_FAILED.to_string()
        }
    };

    match indicator {
        Some(posted) => {
            if let Err(e) = chat.update_message(&posted.channel, &posted.id, &reply).await {
                debug!(error = %e, "indicator update failed, posting reply fresh");
                chat.post_message(channel, &reply)
                    .await
                    .context("posting reply after failed update")?;
            }
        }
        None => {
            chat.post_message(channel, &reply)
                .await
                .context("posting reply")?;
        }
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{IdentityProvider, ServiceCredential, ServiceTokenCache, TokenStore};
    use crate::config::RelayConfig;
    use crate::upstream::{Activity, AgentClient, Conversation, ConversationHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Chat double recording successful posts and updates.
    struct RecordingChat {
        posts: Mutex<Vec<(String, String)>>,
        updates: Mutex<Vec<(String, String, String)>>,
        fail_posts: AtomicUsize,
        fail_updates: AtomicUsize,
        next_id: AtomicUsize,
    }

    impl RecordingChat {
        fn new() -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
                fail_posts: AtomicUsize::new(0),
                fail_updates: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
            }
        }

        fn failing_posts(self, n: usize) -> Self {
            self.fail_posts.store(n, Ordering::SeqCst);
            self
        }

        fn failing_updates(self, n: usize) -> Self {
            self.fail_updates.store(n, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl ChatPlatform for RecordingChat {
        async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage> {
            if self.fail_posts.load(Ordering::SeqCst) > 0 {
                self.fail_posts.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("post rejected");
            }
            let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            self.posts
                .lock()
                .await
                .push((channel.to_string(), text.to_string()));
            Ok(PostedMessage {
                id,
                channel: channel.to_string(),
            })
        }

        async fn update_message(&self, channel: &str, message_id: &str, text: &str) -> Result<()> {
            if self.fail_updates.load(Ordering::SeqCst) > 0 {
                self.fail_updates.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("update rejected");
            }
            self.updates.lock().await.push((
                channel.to_string(),
                message_id.to_string(),
                text.to_string(),
            ));
            Ok(())
        }
    }

    /// Agent double answering every question with one fixed message, or
    /// failing every question when constructed with `None`.
    struct OneShotAgent {
        reply: Option<String>,
    }

    #[async_trait]
    impl AgentClient for OneShotAgent {
        async fn start_conversation(&self, _credential: &str) -> Result<Conversation> {
            Ok(Conversation {
                handle: ConversationHandle::new("handle-1"),
                conversation_id: "conv-1".to_string(),
            })
        }

        async fn ask_question(
            &self,
            _handle: &ConversationHandle,
            _conversation_id: &str,
            _text: &str,
        ) -> Result<Vec<Activity>> {
            match &self.reply {
                Some(reply) => Ok(vec![Activity::message(reply.clone())]),
                None => anyhow::bail!("secret internal failure detail"),
            }
        }
    }

    struct StaticProvider;

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn acquire_service_credential(&self, _scope: &str) -> Result<ServiceCredential> {
            Ok(ServiceCredential {
                token: "service-token".to_string(),
                expires_on: None,
            })
        }
    }

    fn orchestrator(reply: Option<&str>) -> MessageOrchestrator {
        let config = RelayConfig::default();
        let service = Arc::new(ServiceTokenCache::new(
            Box::new(StaticProvider),
            &config.service,
        ));
        MessageOrchestrator::new(
            Arc::new(OneShotAgent {
                reply: reply.map(str::to_string),
            }),
            Arc::new(TokenStore::new()),
            service,
            config,
        )
    }

    #[tokio::test]
    async fn indicator_is_posted_then_replaced() {
        let orch = orchestrator(Some("Hello there"));
        let chat = RecordingChat::new();

        let delivered = deliver(&orch, &chat, "C1", "u1", "hi", None).await.unwrap();
        assert_eq!(delivered, "Hello there");

        let posts = chat.posts.lock().await.clone();
        assert_eq!(posts, vec![("C1".to_string(), WORKING_INDICATOR.to_string())]);

        let updates = chat.updates.lock().await.clone();
        assert_eq!(
            updates,
            vec![("C1".to_string(), "m1".to_string(), "Hello there".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_indicator_still_delivers_the_reply() {
        let orch = orchestrator(Some("Hello"));
        let chat = RecordingChat::new().failing_posts(1);

        let delivered = deliver(&orch, &chat, "C1", "u1", "hi", None).await.unwrap();
        assert_eq!(delivered, "Hello");

        // The only recorded post is the reply itself
        let posts = chat.posts.lock().await.clone();
        assert_eq!(posts, vec![("C1".to_string(), "Hello".to_string())]);
        assert!(chat.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_update_falls_back_to_a_fresh_post() {
        let orch = orchestrator(Some("Hello"));
        let chat = RecordingChat::new().failing_updates(1);

        let delivered = deliver(&orch, &chat, "C1", "u1", "hi", None).await.unwrap();
        assert_eq!(delivered, "Hello");

        let posts = chat.posts.lock().await.clone();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].1, "Hello");
    }

    #[tokio::test]
    async fn failed_turn_delivers_the_apology_without_detail() {
        let orch = orchestrator(None);
        let chat = RecordingChat::new();

        let delivered = deliver(&orch, &chat, "C1", "u1", "hi", None).await.unwrap();
        assert_eq!(delivered, TURN_FAILED);

        let updates = chat.updates.lock().await.clone();
        assert_eq!(updates[0].2, TURN_FAILED);
        assert!(!updates[0].2.contains("secret internal failure detail"));
    }

    #[tokio::test]
    async fn undeliverable_reply_is_an_error() {
        let orch = orchestrator(Some("Hello"));
        let chat = RecordingChat::new().failing_posts(5);

        assert!(deliver(&orch, &chat, "C1", "u1", "hi", None).await.is_err());
    }
}
