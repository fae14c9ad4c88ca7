//! Runtime knobs for the relay core.
//!
//! The embedding process hands the core a [`RelayConfig`], typically parsed
//! from a TOML fragment. Every field has a serde default so a partial file
//! (or none at all) yields a working configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_idle_session_ms() -> u64 {
    30 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_token_max_age_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_turn_timeout_ms() -> u64 {
    120_000
}

fn default_consent_max_depth() -> u32 {
    3
}

fn default_refresh_buffer_ms() -> u64 {
    5 * 60 * 1000
}

/// Top-level configuration for the relay core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Idle time after which a user session is swept, in milliseconds.
    #[serde(default = "default_idle_session_ms")]
    pub idle_session_ms: u64,

    /// Interval between janitor sweeps, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Age after which an unused stored credential is swept, in milliseconds.
    /// Independent of the credential's own expiration claim.
    #[serde(default = "default_token_max_age_ms")]
    pub token_max_age_ms: u64,

    /// Deadline for one whole chat turn (send, consent chain, classify),
    /// in milliseconds.
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,

    /// Maximum consent-approval resends before the turn fails closed.
    #[serde(default = "default_consent_max_depth")]
    pub consent_max_depth: u32,

    /// Service-credential settings.
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Settings for the shared service credential (client-credential grant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// OAuth scope requested from the identity provider.
    #[serde(default)]
    pub scope: String,

    /// Safety margin before expiry at which the token is refreshed,
    /// in milliseconds.
    #[serde(default = "default_refresh_buffer_ms")]
    pub refresh_buffer_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_session_ms: default_idle_session_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            token_max_age_ms: default_token_max_age_ms(),
            turn_timeout_ms: default_turn_timeout_ms(),
            consent_max_depth: default_consent_max_depth(),
            service: ServiceConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scope: String::new(),
            refresh_buffer_ms: default_refresh_buffer_ms(),
        }
    }
}

impl RelayConfig {
    /// Parse a config from TOML text. Missing fields fall back to defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse relay config")
    }

    /// Session idle cutoff as a chrono duration (compared against
    /// `last_activity` timestamps).
    pub fn idle_session(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.idle_session_ms as i64)
    }

    /// Janitor tick interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Stored-credential age cutoff.
    pub fn token_max_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.token_max_age_ms as i64)
    }

    /// Per-turn deadline.
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }
}

impl ServiceConfig {
    /// Refresh safety margin as a chrono duration.
    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.refresh_buffer_ms as i64)
    }
}
