//! Crate-wide error taxonomy for the relay core.
//!
//! Collaborator traits ([`crate::upstream::AgentClient`],
//! [`crate::auth::IdentityProvider`], [`crate::channels::ChatPlatform`])
//! return `anyhow::Result`; the core maps those into this taxonomy at the
//! boundary so callers can match on what actually went wrong.

use thiserror::Error;

/// Failures a chat turn surfaces to its caller.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No usable credential: nothing supplied by the caller, nothing cached
    /// for the user, and the service grant could not be refreshed.
    #[error("credential unavailable: {reason}")]
    CredentialUnavailable { reason: String },

    /// The upstream agent rejected or dropped the call.
    #[error("upstream agent unavailable: {source}")]
    UpstreamUnavailable {
        #[source]
        source: anyhow::Error,
    },

    /// The consent auto-approval chain kept producing new consent prompts
    /// past the configured depth.
    #[error("consent approval loop exceeded maximum depth of {max_depth}")]
    ConsentLoopExceeded { max_depth: u32 },

    /// The turn ran past its deadline. The session is invalidated before
    /// this is returned so the next message starts clean.
    #[error("turn timed out after {waited_ms} ms")]
    TurnTimedOut { waited_ms: u64 },
}

impl RelayError {
    /// Shorthand for [`RelayError::CredentialUnavailable`].
    pub fn credential(reason: impl Into<String>) -> Self {
        Self::CredentialUnavailable {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RelayError::UpstreamUnavailable`].
    pub fn upstream(source: anyhow::Error) -> Self {
        Self::UpstreamUnavailable { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_limit_values() {
        let err = RelayError::ConsentLoopExceeded { max_depth: 3 };
        assert!(err.to_string().contains("3"));

        let err = RelayError::TurnTimedOut { waited_ms: 120_000 };
        assert!(err.to_string().contains("120000"));
    }

    #[test]
    fn upstream_preserves_source_chain() {
        let inner = anyhow::anyhow!("connection refused");
        let err = RelayError::upstream(inner.context("starting conversation"));
        let display = format!("{err}");
        assert!(display.contains("starting conversation"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
