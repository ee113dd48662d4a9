//! Orchestration errors.

use axon_core::HandlerError;
use thiserror::Error;

/// Errors from handler registration and dispatch.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrchError {
    /// A handler with this name is already registered.
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),

    /// Dispatch referenced a handler that is not registered.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// Route mode found neither a `route_to` target nor a `default` handler.
    #[error("no route for event")]
    NoRoute,

    /// The per-dispatch timeout fired; in-flight handlers were cancelled.
    #[error("dispatch timed out after {0}ms")]
    DispatchTimeout(u64),

    /// A handler returned a hard error.
    #[error("agent {agent} failed: {source}")]
    HandlerFailed {
        /// The failing handler.
        agent: String,
        /// The underlying error.
        #[source]
        source: HandlerError,
    },

    /// More handlers failed than the failure threshold allows.
    #[error("{failed} of {total} agents failed, exceeding the failure threshold")]
    TooManyFailures {
        /// Handlers that failed.
        failed: usize,
        /// Handlers dispatched.
        total: usize,
    },

    /// Context cancellation was observed mid-dispatch.
    #[error("dispatch cancelled")]
    Cancelled,

    /// The orchestration configuration is unusable for this dispatch.
    #[error("invalid orchestration config: {0}")]
    InvalidConfig(String),

    /// A context/composition error (e.g. depth cap) outside any one handler.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}
