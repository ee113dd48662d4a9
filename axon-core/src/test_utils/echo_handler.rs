//! Simple handlers for exercising orchestration and runner integrations.

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::event::Event;
use crate::handler::{AgentHandler, AgentResult};
use crate::state::SharedState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

/// Copies the event's `message` payload value to the state's `response`
/// key and returns success.
pub struct EchoHandler;

#[async_trait]
impl AgentHandler for EchoHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        if let Some(message) = event.payload_value("message") {
            state.set("response", message.clone());
        }
        Ok(AgentResult::success(state))
    }
}

/// Always returns a hard error.
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    /// Create a handler that fails with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl AgentHandler for FailingHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        _event: &Event,
        _state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        Err(HandlerError::Failed(self.message.clone()))
    }
}

/// Counts invocations and writes its name into the state.
///
/// Each call sets `state[name] = "ok"` and bumps the shared counter, so
/// tests can assert both the merged state and the number of invocations.
pub struct CountingHandler {
    name: String,
    calls: AtomicU32,
}

impl CountingHandler {
    /// Create a counting handler with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// How many times this handler has run.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentHandler for CountingHandler {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        _event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        state.set(self.name.clone(), serde_json::Value::String("ok".into()));
        Ok(AgentResult::success(state))
    }
}

/// Sleeps for a fixed time, honoring cancellation, then succeeds.
pub struct SleepyHandler {
    delay: std::time::Duration,
}

impl SleepyHandler {
    /// Create a handler that sleeps for `delay` before returning.
    pub fn new(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AgentHandler for SleepyHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        _event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(AgentResult::success(state)),
            _ = ctx.cancellation().cancelled() => Err(HandlerError::Cancelled),
        }
    }
}
