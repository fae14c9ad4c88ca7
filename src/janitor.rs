//! Background maintenance: periodic cache sweeps.
//!
//! Eviction itself lives in the caches; this task only supplies the clock.
//! [`JanitorTask::sweep_once`] is directly callable so tests (and operator
//! tooling) can drive a sweep at a chosen instant without any timer.

use crate::auth::TokenStore;
use crate::config::RelayConfig;
use crate::sessions::ConnectionRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_evicted: usize,
    pub tokens_evicted: usize,
}

/// Periodic janitor evicting idle sessions and stale credentials.
pub struct JanitorTask {
    registry: Arc<ConnectionRegistry>,
    tokens: Arc<TokenStore>,
    config: RelayConfig,
}

impl JanitorTask {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        tokens: Arc<TokenStore>,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry,
            tokens,
            config,
        }
    }

    /// Run one sweep pass at `now`. Never fails; counts are logged and
    /// returned.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let sessions_evicted = self.registry.sweep(now, self.config.idle_session()).await;
        let tokens_evicted = self.tokens.sweep(now, self.config.token_max_age());

        if sessions_evicted > 0 || tokens_evicted > 0 {
            info!(sessions_evicted, tokens_evicted, "janitor sweep evicted entries");
        } else {
            debug!("janitor sweep found nothing to evict");
        }

        SweepReport {
            sessions_evicted,
            tokens_evicted,
        }
    }

    /// Spawn the free-running sweep loop on the configured interval. The
    /// loop runs until the handle is aborted or the runtime shuts down.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        // A zero period would panic tokio::time::interval; clamp it.
        let period = self
            .config
            .sweep_interval()
            .max(std::time::Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; skip it so spawning
            // does not race cache setup.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep_once(Utc::now()).await;
            }
        })
    }
}
