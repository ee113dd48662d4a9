//! The SessionStore contract — short-term per-conversation persistence.

use crate::error::SessionError;
use crate::id::SessionId;
use crate::state::SharedState;
use async_trait::async_trait;

/// Short-term persistence for per-conversation state.
///
/// The engine itself never calls a session store; it is a contract for
/// hosts that want conversation continuity across events. Backends are
/// external collaborators (the `test-utils` feature ships an in-memory
/// one for tests).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state for a session. `None` if the session is unknown.
    async fn load(&self, session: &SessionId) -> Result<Option<SharedState>, SessionError>;

    /// Persist the state for a session. Creates or overwrites.
    async fn save(&self, session: &SessionId, state: &SharedState) -> Result<(), SessionError>;

    /// Drop a session. No-op if unknown.
    async fn delete(&self, session: &SessionId) -> Result<(), SessionError>;

    /// List known sessions. Order is unspecified.
    async fn list(&self) -> Result<Vec<SessionId>, SessionError>;
}
