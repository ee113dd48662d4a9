//! MemorySessionStore — HashMap-backed session persistence for tests.

use crate::error::SessionError;
use crate::id::SessionId;
use crate::session::SessionStore;
use crate::state::{SharedState, StateSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory session store backed by a `HashMap` behind a `RwLock`.
///
/// Stores snapshots, so a saved state and the live state it came from stay
/// independent.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StateSnapshot>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session: &SessionId) -> Result<Option<SharedState>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session.as_str())
            .cloned()
            .map(SharedState::from_snapshot))
    }

    async fn save(&self, session: &SessionId, state: &SharedState) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.as_str().to_string(), state.snapshot());
        Ok(())
    }

    async fn delete(&self, session: &SessionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session.as_str());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().map(|k| SessionId::from(k.as_str())).collect())
    }
}
