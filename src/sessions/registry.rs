//! Per-user upstream conversation registry.
//!
//! One live conversation per user. Creation is single-flight per key: the
//! per-user cell's async lock is held across the upstream call, so a second
//! message arriving while the first is still connecting waits for that
//! conversation instead of opening its own.

use crate::error::RelayError;
use crate::upstream::{AgentClient, ConversationHandle};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

type SessionCell = Arc<tokio::sync::Mutex<Option<UserSession>>>;

/// A user's live link to the upstream agent.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub handle: ConversationHandle,
    pub conversation_id: String,
    pub last_activity: DateTime<Utc>,
}

/// Registry of user sessions keyed by user id.
pub struct ConnectionRegistry {
    agent: Arc<dyn AgentClient>,
    cells: parking_lot::Mutex<HashMap<String, SessionCell>>,
}

impl ConnectionRegistry {
    pub fn new(agent: Arc<dyn AgentClient>) -> Self {
        Self {
            agent,
            cells: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, user_id: &str) -> SessionCell {
        let mut cells = self.cells.lock();
        cells.entry(user_id.to_string()).or_default().clone()
    }

    /// Return the user's session, opening a conversation upstream if none
    /// exists yet.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        credential: &str,
    ) -> Result<UserSession, RelayError> {
        self.get_or_create_at(user_id, credential, Utc::now()).await
    }

    pub async fn get_or_create_at(
        &self,
        user_id: &str,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<UserSession, RelayError> {
        let cell = self.cell(user_id);
        self.create_in(cell, user_id, credential, now).await
    }

    async fn create_in(
        &self,
        cell: SessionCell,
        user_id: &str,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<UserSession, RelayError> {
        let mut slot = cell.lock().await;

        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        // Holding the cell lock across the upstream call is what makes
        // creation single-flight: later callers for this user queue here
        // and find the stored session.
        let conversation = self
            .agent
            .start_conversation(credential)
            .await
            .map_err(RelayError::upstream)?;

        tracing::info!(
            user = %user_id,
            conversation = %conversation.conversation_id,
            "upstream conversation started"
        );

        let session = UserSession {
            user_id: user_id.to_string(),
            handle: conversation.handle,
            conversation_id: conversation.conversation_id,
            last_activity: now,
        };
        *slot = Some(session.clone());
        self.reattach(user_id, &cell);
        Ok(session)
    }

    /// Re-insert `cell` if it is no longer the mapped one. A sweep can drop
    /// an empty cell in the gap between [`Self::cell`] returning and the
    /// caller locking it; a fresh session must land in a mapped cell or the
    /// registry never tracks it.
    fn reattach(&self, user_id: &str, cell: &SessionCell) {
        let mut cells = self.cells.lock();
        match cells.get(user_id) {
            Some(current) if Arc::ptr_eq(current, cell) => {}
            Some(_) => {
                tracing::warn!(user = %user_id, "cell was replaced during creation");
            }
            None => {
                tracing::debug!(user = %user_id, "restoring cell dropped mid-creation");
                cells.insert(user_id.to_string(), cell.clone());
            }
        }
    }

    /// Drop the user's session. Returns whether one existed. Waits for an
    /// in-flight creation on the same key to settle, then clears whatever
    /// it produced.
    pub async fn invalidate(&self, user_id: &str) -> bool {
        let cell = self.cells.lock().remove(user_id);
        match cell {
            Some(cell) => {
                let existed = cell.lock().await.take().is_some();
                if existed {
                    tracing::info!(user = %user_id, "session invalidated");
                }
                existed
            }
            None => false,
        }
    }

    /// Refresh the session's activity stamp. No-op when the user has no
    /// session.
    pub async fn touch(&self, user_id: &str) {
        self.touch_at(user_id, Utc::now()).await;
    }

    pub async fn touch_at(&self, user_id: &str, now: DateTime<Utc>) {
        let cell = self.cells.lock().get(user_id).cloned();
        if let Some(cell) = cell {
            if let Some(session) = cell.lock().await.as_mut() {
                session.last_activity = now;
            }
        }
    }

    /// Evict every session idle for longer than `idle`. Cells busy with an
    /// in-flight creation are skipped; they are active by definition.
    /// Returns the number of sessions evicted.
    pub async fn sweep(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let snapshot: Vec<(String, SessionCell)> = {
            let cells = self.cells.lock();
            cells
                .iter()
                .map(|(user_id, cell)| (user_id.clone(), cell.clone()))
                .collect()
        };

        let mut evicted = 0;
        for (user_id, cell) in snapshot {
            let mut cells = self.cells.lock();
            // The key may have been invalidated or replaced since the
            // snapshot; only act on the exact cell we saw.
            let Some(current) = cells.get(&user_id) else {
                continue;
            };
            if !Arc::ptr_eq(current, &cell) {
                continue;
            }
            let Ok(slot) = cell.try_lock() else {
                continue;
            };
            let stale = match slot.as_ref() {
                Some(session) => now - session.last_activity > idle,
                // Placeholder left behind by a failed creation
                None => true,
            };
            if stale {
                cells.remove(&user_id);
                if slot.is_some() {
                    evicted += 1;
                    tracing::debug!(user = %user_id, "idle session evicted");
                }
            }
        }
        evicted
    }

    /// Point-in-time snapshot for the health surface. Sessions mid-creation
    /// are counted but carry no detail yet.
    pub async fn stats(&self) -> RegistryStats {
        let snapshot: Vec<(String, SessionCell)> = {
            let cells = self.cells.lock();
            cells
                .iter()
                .map(|(user_id, cell)| (user_id.clone(), cell.clone()))
                .collect()
        };

        let mut sessions = Vec::new();
        let mut connecting = 0;
        for (user_id, cell) in snapshot {
            match cell.try_lock() {
                Ok(slot) => {
                    if let Some(session) = slot.as_ref() {
                        sessions.push(SessionSummary {
                            user_id,
                            conversation_id: session.conversation_id.clone(),
                            last_activity: session.last_activity,
                        });
                    }
                }
                Err(_) => connecting += 1,
            }
        }
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        RegistryStats {
            active_sessions: sessions.len(),
            connecting,
            sessions,
        }
    }
}

/// Registry snapshot (used by the health endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub connecting: usize,
    pub sessions: Vec<SessionSummary>,
}

/// Summary of one live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub user_id: String,
    pub conversation_id: String,
    pub last_activity: DateTime<Utc>,
}
