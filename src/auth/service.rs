//! Shared service credential obtained through a client-credential grant.
//!
//! When a user has no credential of their own, turns fall back to a single
//! application-wide token. It is cached here and refreshed ahead of its
//! expiration so turns almost never wait on the identity provider.

use crate::config::ServiceConfig;
use crate::error::RelayError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Lifetime assumed when the provider omits an expiration.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Credential as returned by the identity provider.
#[derive(Debug, Clone)]
pub struct ServiceCredential {
    pub token: String,
    /// Provider-reported expiration. `None` means the provider did not say.
    pub expires_on: Option<DateTime<Utc>>,
}

/// Client-credential grant seam. Implemented by the embedding process over
/// its HTTP stack; the core never sees a socket.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn acquire_service_credential(&self, scope: &str) -> Result<ServiceCredential>;
}

struct CachedCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Cache for the single service credential.
///
/// The cell lock is held across the provider call, so concurrent callers
/// finding a stale cache coalesce into one refresh and all receive its
/// result.
pub struct ServiceTokenCache {
    provider: Box<dyn IdentityProvider>,
    scope: String,
    refresh_buffer: Duration,
    cached: Mutex<Option<CachedCredential>>,
}

impl ServiceTokenCache {
    pub fn new(provider: Box<dyn IdentityProvider>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            scope: config.scope.clone(),
            refresh_buffer: config.refresh_buffer(),
            cached: Mutex::new(None),
        }
    }

    /// Return the cached token, refreshing it first when missing or within
    /// the safety buffer of its expiration.
    ///
    /// A failed refresh clears the cache before propagating, so the next
    /// call retries from scratch instead of reusing a doomed entry.
    pub async fn get_or_refresh(&self) -> Result<String, RelayError> {
        self.get_or_refresh_at(Utc::now()).await
    }

    pub async fn get_or_refresh_at(&self, now: DateTime<Utc>) -> Result<String, RelayError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if now < entry.expires_at - self.refresh_buffer {
                return Ok(entry.token.clone());
            }
        }

        match self.provider.acquire_service_credential(&self.scope).await {
            Ok(credential) => {
                let expires_at = credential
                    .expires_on
                    .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
                tracing::info!(%expires_at, "service credential refreshed");
                let token = credential.token;
                *cached = Some(CachedCredential {
                    token: token.clone(),
                    expires_at,
                });
                Ok(token)
            }
            Err(e) => {
                *cached = None;
                tracing::warn!(error = %e, "service credential refresh failed");
                Err(RelayError::credential(format!(
                    "service token refresh failed: {e:#}"
                )))
            }
        }
    }
}
