//! Errors from the tool bridge.

use thiserror::Error;

/// Errors from tool discovery, pooling, and invocation.
///
/// The transient/permanent split drives the retry policy:
/// [`is_transient`](Self::is_transient) errors may be re-attempted,
/// everything else returns immediately.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not known to the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The hinted or selected provider is not registered.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A provider with this id is already registered.
    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    /// The call failed but retrying might succeed (connection reset,
    /// provider-declared retryable).
    #[error("transient: {0}")]
    Transient(String),

    /// The call failed and retrying won't help (bad arguments, provider
    /// rejected the tool).
    #[error("permanent: {0}")]
    Permanent(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The provider's circuit breaker is open; the call was not attempted.
    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    /// The connection pool had no capacity within the acquire timeout.
    #[error("pool acquire timed out after {0}ms")]
    AcquireTimeout(u64),

    /// The connection pool is closed or exhausted.
    #[error("pool exhausted")]
    PoolExhausted,

    /// Context cancellation was observed.
    #[error("cancelled")]
    Cancelled,

    /// The registry is shutting down and no longer accepts invocations.
    #[error("registry shutting down")]
    ShuttingDown,

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ToolError {
    /// Whether a retry may re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::Timeout(_) | Self::AcquireTimeout(_) | Self::PoolExhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ToolError::Transient("reset".into()).is_transient());
        assert!(ToolError::Timeout(100).is_transient());
        assert!(ToolError::AcquireTimeout(100).is_transient());
        assert!(!ToolError::Permanent("bad args".into()).is_transient());
        assert!(!ToolError::CircuitOpen("p1".into()).is_transient());
        assert!(!ToolError::Cancelled.is_transient());
    }
}
