//! Error types for the core contracts.
//!
//! Subsystem crates (orchestrator, runner, tool bridge) define their own
//! error enums; this module covers only the contracts that live here.

use thiserror::Error;

/// Agent handler execution errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler failed and the dispatch should treat it as a hard error.
    /// Recoverable failures go in `AgentResult::error_message` instead.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler observed context cancellation and unwound.
    #[error("cancelled")]
    Cancelled,

    /// The handler (or a composite sub-flow) exceeded its time budget.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Composite-handler nesting exceeded the context's depth cap.
    #[error("composition depth {depth} exceeds cap {max}")]
    DepthExceeded {
        /// Depth that was requested.
        depth: u32,
        /// The configured cap.
        max: u32,
    },

    /// A model provider error propagated out of the handler.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Callback execution errors. These are logged and recorded as trace
/// entries but never abort the dispatch.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The callback failed.
    #[error("callback failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Model provider errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be completed but retrying might succeed.
    #[error("retryable: {0}")]
    Retryable(String),

    /// The request failed and retrying won't help.
    #[error("non-retryable: {0}")]
    NonRetryable(String),

    /// The provider observed context cancellation.
    #[error("cancelled")]
    Cancelled,

    /// The provider returned a response the adapter could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether a retry policy may re-attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Session store errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend failed to load a session.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// The backend failed to persist a session.
    #[error("save failed: {0}")]
    SaveFailed(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Trace logger errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TraceError {
    /// Appending an entry failed.
    #[error("log failed: {0}")]
    LogFailed(String),

    /// Reading a session's trace failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
