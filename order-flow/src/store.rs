use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::draft::{OrderDraft, UserProfile};
use crate::error::Result;

/// Shared handle to one user's draft. Holding the lock serializes all work on
/// that session; callers must release it before doing outbound I/O.
pub type SessionHandle = Arc<Mutex<OrderDraft>>;

/// Storage boundary for active sessions, keyed by user id.
///
/// `create` always installs a fresh draft, replacing whatever was there; the
/// entry command is a reset, not a resume. Completed, cancelled and dead-end
/// sessions are removed, so the store only ever holds dialogues that are
/// still in progress.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<SessionHandle>>;

    async fn create(&self, profile: &UserProfile) -> Result<SessionHandle>;

    /// Removes a session if present. Returns whether one existed, so callers
    /// can treat repeated removal as a no-op.
    async fn remove(&self, user_id: &str) -> Result<bool>;

    /// Drops sessions idle for longer than `max_idle`. Sessions currently
    /// processing an event are skipped and picked up by a later sweep.
    async fn remove_idle(&self, max_idle: Duration) -> Result<usize>;

    async fn active_count(&self) -> usize;
}

/// Keeps all sessions in process memory. Restarting the service forgets every
/// draft, which matches how the dialogue recovers anyway: users are told to
/// start over whenever their session is gone.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<SessionHandle>> {
        Ok(self.sessions.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, profile: &UserProfile) -> Result<SessionHandle> {
        let handle: SessionHandle = Arc::new(Mutex::new(OrderDraft::new(profile.clone())));
        self.sessions.insert(profile.id.clone(), handle.clone());
        debug!(user_id = %profile.id, "session created");
        Ok(handle)
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        let existed = self.sessions.remove(user_id).is_some();
        if existed {
            debug!(user_id = %user_id, "session removed");
        }
        Ok(existed)
    }

    async fn remove_idle(&self, max_idle: Duration) -> Result<usize> {
        let mut removed = 0;
        self.sessions.retain(|user_id, handle| match handle.try_lock() {
            Ok(draft) => {
                let idle = (Utc::now() - draft.updated_at).to_std().unwrap_or_default();
                if idle > max_idle {
                    debug!(user_id = %user_id, idle_secs = idle.as_secs(), "expiring idle session");
                    removed += 1;
                    false
                } else {
                    true
                }
            }
            // An event is being processed right now, so the session is not idle.
            Err(_) => true,
        });
        Ok(removed)
    }

    async fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
