//! Core for bridging chat-platform users to a stateful upstream AI agent.
//!
//! One logical conversation per user, credential caching with expiration
//! tracking, and turn orchestration: send a message upstream, classify the
//! response fragments (plain text, consent prompts, sign-in cards), and
//! resolve them into a single reply. The chat platform, the identity
//! provider, and the agent SDK stay behind traits implemented by the
//! embedding process; this crate owns the state and the protocol between
//! them.

pub mod auth;
pub mod channels;
pub mod config;
pub mod error;
pub mod janitor;
pub mod relay;
pub mod sessions;
pub mod upstream;

pub use channels::{deliver, ChatPlatform, PostedMessage};
pub use config::RelayConfig;
pub use error::RelayError;
pub use janitor::JanitorTask;
pub use relay::MessageOrchestrator;
