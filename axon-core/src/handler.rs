//! The AgentHandler contract — what one agent does per event.

use crate::context::ExecutionContext;
use crate::duration::DurationMs;
use crate::error::HandlerError;
use crate::event::Event;
use crate::state::SharedState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future alias used by the closure adapters.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The result of one handler invocation.
///
/// The output state is owned by the caller after return. A populated
/// `error_message` marks a *recoverable* failure: the dispatch still has an
/// output state to merge or route on. Hard failures return `Err` from
/// [`AgentHandler::handle`] instead.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// The handler's output state.
    pub state: SharedState,
    /// Set on recoverable failure; `None` on success.
    pub error_message: Option<String>,
    /// Wall-clock start of the invocation.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the invocation.
    pub finished_at: DateTime<Utc>,
    /// Invocation duration.
    pub duration: DurationMs,
}

impl AgentResult {
    /// A successful result carrying the output state. Timestamps are
    /// stamped "now"; the dispatcher overwrites them with measured values.
    pub fn success(state: SharedState) -> Self {
        let now = Utc::now();
        Self {
            state,
            error_message: None,
            started_at: now,
            finished_at: now,
            duration: DurationMs::ZERO,
        }
    }

    /// A recoverable failure: the output state still surfaces for routing.
    pub fn failure(state: SharedState, message: impl Into<String>) -> Self {
        let mut result = Self::success(state);
        result.error_message = Some(message.into());
        result
    }

    /// Whether `error_message` is unset.
    pub fn is_success(&self) -> bool {
        self.error_message.is_none()
    }

    /// Overwrite the timing fields with measured values.
    pub fn stamp(&mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) {
        self.started_at = started_at;
        self.finished_at = finished_at;
        let elapsed = (finished_at - started_at).num_milliseconds().max(0) as u64;
        self.duration = DurationMs::from_millis(elapsed);
    }
}

/// What one agent does per event.
///
/// The handler receives the event by reference and its own clone of the
/// dispatch state; it must not retain references to either beyond return.
/// It must honor `ctx` cancellation and return within a reasonable bound
/// after the token fires.
///
/// To route a follow-up, set the `route_to` metadata key on the output
/// state (see [`crate::keys::ROUTE_TO`]).
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Process one event against the given state.
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError>;
}

/// Wrapper that implements [`AgentHandler`] for a closure returning a boxed
/// future.
struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> AgentHandler for HandlerFn<F>
where
    F: for<'a> Fn(
            &'a ExecutionContext,
            &'a Event,
            SharedState,
        ) -> BoxFuture<'a, Result<AgentResult, HandlerError>>
        + Send
        + Sync,
{
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        (self.f)(ctx, event, state).await
    }
}

/// Create a handler from a closure.
///
/// The closure must return a `Box::pin(async move { ... })` future.
///
/// # Example
///
/// ```
/// use axon_core::{handler_fn, AgentResult};
///
/// let echo = handler_fn(|_ctx, event, state| {
///     let message = event.payload_value("message").cloned();
///     Box::pin(async move {
///         if let Some(message) = message {
///             state.set("response", message);
///         }
///         Ok(AgentResult::success(state))
///     })
/// });
/// # let _ = echo;
/// ```
#[must_use]
pub fn handler_fn<F>(f: F) -> impl AgentHandler
where
    F: for<'a> Fn(
            &'a ExecutionContext,
            &'a Event,
            SharedState,
        ) -> BoxFuture<'a, Result<AgentResult, HandlerError>>
        + Send
        + Sync,
{
    HandlerFn { f }
}
