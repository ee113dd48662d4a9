//! Execution context — cancellation, deadline, and composition depth.

use crate::error::HandlerError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default cap on composite-handler nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// Per-dispatch execution context handed to handlers, callbacks, and the
/// tool bridge.
///
/// The cancellation token is the authoritative stop signal: when it fires,
/// everything holding a child of this context is expected to return
/// promptly. Timeouts are expressed as a deadline so nested components can
/// derive their remaining budget without re-reading configuration.
///
/// The depth counter guards against cyclic handler composition: each
/// composite layer calls [`descend`](Self::descend), and the cap (default
/// 16) turns an accidental self-reference into an error instead of an
/// unbounded dispatch.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    depth: u32,
    max_depth: u32,
}

impl ExecutionContext {
    /// Create a root context with a fresh cancellation token and no deadline.
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Create a root context tied to an existing cancellation token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            deadline: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the composition depth cap.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The cancellation token for this context.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Request cancellation of this context and all children derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time remaining until the deadline. `None` means unbounded;
    /// `Some(ZERO)` means the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Current composition depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Derive a child context one level deeper, sharing cancellation via a
    /// child token. Fails once the depth cap is reached.
    pub fn descend(&self) -> Result<Self, HandlerError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(HandlerError::DepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        Ok(Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
            depth,
            max_depth: self.max_depth,
        })
    }

    /// Derive a child context with its own cancellable token, returned so
    /// the caller can cancel the child without cancelling itself.
    pub fn descend_cancellable(&self) -> Result<(Self, CancellationToken), HandlerError> {
        let child = self.descend()?;
        let token = child.cancellation.clone();
        Ok((child, token))
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
