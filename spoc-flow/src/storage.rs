use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::session::{Session, SessionHandle};

/// Trait for looking up, replacing and expiring sessions.
///
/// Lookups never miss: an unknown id gets a fresh session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, id: &str) -> Result<SessionHandle>;

    /// Replaces the session for `id` with a fresh record.
    ///
    /// Holders of the previous handle keep writing to the old record, which
    /// is no longer reachable from the store.
    async fn reset(&self, id: &str) -> Result<SessionHandle>;

    async fn get(&self, id: &str) -> Result<Option<SessionHandle>>;

    /// Drops sessions idle for longer than `max_idle` that have no job
    /// running. Returns how many were removed.
    async fn evict_idle(&self, max_idle: Duration) -> Result<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
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
    async fn get_or_create(&self, id: &str) -> Result<SessionHandle> {
        let handle = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %id, "Creating new session");
                Session::new(id).into_handle()
            })
            .clone();
        Ok(handle)
    }

    async fn reset(&self, id: &str) -> Result<SessionHandle> {
        let handle = Session::new(id).into_handle();
        self.sessions.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn get(&self, id: &str) -> Result<Option<SessionHandle>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn evict_idle(&self, max_idle: Duration) -> Result<usize> {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return Ok(0);
        };

        let before = self.sessions.len();
        // A handle held outside the store belongs to a turn or a job; the
        // shard lock taken by `retain` keeps new lookups from cloning one.
        self.sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.running || session.updated_at > cutoff,
                Err(_) => true,
            }
        });
        Ok(before.saturating_sub(self.sessions.len()))
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
