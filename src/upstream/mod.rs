//! Upstream agent seam: conversation lifecycle and question dispatch.

pub mod activity;

pub use activity::{Activity, Attachment};

use anyhow::Result;
use async_trait::async_trait;

/// Opaque handle to a live upstream conversation.
///
/// The core never looks inside; implementations pack whatever routing state
/// they need into it (a watermark, a region, a serialized reference).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly opened conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub handle: ConversationHandle,
    pub conversation_id: String,
}

/// Client for the stateful upstream conversational agent.
///
/// Implemented by the embedding process over the vendor SDK; the core only
/// drives this seam. One `ask_question` call covers one full turn and
/// returns every response fragment the agent produced for it.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Open a new conversation authenticated with `credential`.
    async fn start_conversation(&self, credential: &str) -> Result<Conversation>;

    /// Send one message on an existing conversation and collect the full
    /// ordered set of response fragments for the turn.
    async fn ask_question(
        &self,
        handle: &ConversationHandle,
        conversation_id: &str,
        text: &str,
    ) -> Result<Vec<Activity>>;
}
