//! Per-user credential cache with expiration tracking and eviction.
//!
//! Two eviction passes run independently: a lazy check on every read that
//! drops credentials whose embedded expiration has passed, and a coarser
//! age sweep driven by the janitor that drops credentials unused for too
//! long regardless of their expiration claim.

use crate::auth::claims;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire shapes accepted for a stored credential.
///
/// Older installations persisted the bare token string; current ones write
/// the structured record. Both deserialize through this union and normalize
/// to the same read path in [`TokenStore::get`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredCredential {
    /// Structured record carrying the decoded expiration, if any.
    #[serde(rename_all = "camelCase")]
    Structured {
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Bare token string from an older cache. Its expiration is re-decoded
    /// on every read rather than cached.
    Legacy(String),
}

impl StoredCredential {
    fn token(&self) -> &str {
        match self {
            Self::Structured { token, .. } => token,
            Self::Legacy(token) => token,
        }
    }

    /// Effective expiration for validation. Legacy strings are decoded
    /// fresh each call.
    fn effective_expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Structured { expires_at, .. } => *expires_at,
            Self::Legacy(token) => claims::decode_expiry(token),
        }
    }
}

struct TokenEntry {
    credential: StoredCredential,
    #[allow(dead_code)]
    stored_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Keyed cache of per-user credentials.
///
/// All operations are lock-scoped and never await; safe to call from any
/// task. Public entry points use the current wall clock; `_at` variants
/// take an explicit `now` so tests can drive time.
#[derive(Default)]
pub struct TokenStore {
    entries: Mutex<HashMap<String, TokenEntry>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential for a user, decoding its expiration claim when
    /// one is present. Decode failure is not an error; the credential is
    /// kept with no known expiration. Overwrites any existing record.
    pub fn store(&self, user_id: &str, token: impl Into<String>) {
        self.store_at(user_id, token, Utc::now());
    }

    pub fn store_at(&self, user_id: &str, token: impl Into<String>, now: DateTime<Utc>) {
        let token = token.into();
        let expires_at = claims::decode_expiry(&token);
        if expires_at.is_none() {
            tracing::debug!(user = %user_id, "credential has no decodable expiration claim");
        }
        self.import_at(user_id, StoredCredential::Structured { token, expires_at }, now);
    }

    /// Ingest a credential in either wire shape, preserving the shape.
    pub fn import(&self, user_id: &str, credential: StoredCredential) {
        self.import_at(user_id, credential, Utc::now());
    }

    pub fn import_at(&self, user_id: &str, credential: StoredCredential, now: DateTime<Utc>) {
        let mut entries = self.entries.lock();
        entries.insert(
            user_id.to_string(),
            TokenEntry {
                credential,
                stored_at: now,
                last_used: now,
            },
        );
    }

    /// Fetch the credential for a user.
    ///
    /// Returns `None` when absent or expired; an expired record is deleted
    /// on observation, not merely hidden. A successful read refreshes the
    /// entry's `last_used` stamp.
    pub fn get(&self, user_id: &str) -> Option<String> {
        self.get_at(user_id, Utc::now())
    }

    pub fn get_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(user_id)?;

        if let Some(expires_at) = entry.credential.effective_expiry() {
            if expires_at <= now {
                entries.remove(user_id);
                tracing::debug!(user = %user_id, %expires_at, "evicted expired credential");
                return None;
            }
        }

        entry.last_used = now;
        Some(entry.credential.token().to_string())
    }

    /// Delete a user's credential. Returns whether one existed.
    pub fn revoke(&self, user_id: &str) -> bool {
        let removed = self.entries.lock().remove(user_id).is_some();
        if removed {
            tracing::debug!(user = %user_id, "credential revoked");
        }
        removed
    }

    /// Evict every credential unused for longer than `max_age`, regardless
    /// of its expiration claim. Returns the eviction count.
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.last_used <= max_age);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
