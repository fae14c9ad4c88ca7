//! User session tracking against the upstream agent.

pub mod registry;

pub use registry::{ConnectionRegistry, RegistryStats, SessionSummary, UserSession};
