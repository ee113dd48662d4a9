//! The callback vocabulary — where in the dispatch lifecycle hooks fire
//! and what they see.

use crate::context::ExecutionContext;
use crate::error::CallbackError;
use crate::event::Event;
use crate::handler::{AgentResult, BoxFuture};
use crate::id::AgentId;
use crate::state::SharedState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where in the dispatch lifecycle a callback fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before the runner hands an event to the orchestrator.
    BeforeEventHandling,
    /// After dispatch completes (success or failure).
    AfterEventHandling,
    /// Before each handler runs.
    BeforeAgentRun,
    /// After each handler completes.
    AfterAgentRun,
    /// Before the orchestrator applies its dispatch policy.
    BeforeOrchestration,
    /// After the orchestrator has merged results.
    AfterOrchestration,
    /// Before a tool invocation (brackets retries).
    BeforeToolCall,
    /// After a tool invocation returns (cached, success, or error).
    AfterToolCall,
    /// A handler returned a hard error. Callbacks here observe the error
    /// but cannot suppress it.
    AgentError,
}

/// What a callback sees at its firing point.
///
/// `state` is the current working state; each callback's returned state is
/// passed as the next callback's `state`, so a chain can accumulate edits.
/// Event and result ride behind `Arc` — a hook chain observes one dispatch,
/// it does not own it.
#[derive(Debug, Clone)]
pub struct CallbackArgs {
    /// The hook point being fired.
    pub point: HookPoint,
    /// The event being dispatched (absent for tool-only firings).
    pub event: Option<Arc<Event>>,
    /// The handler involved (only at agent-scoped points).
    pub agent_id: Option<AgentId>,
    /// Current working state.
    pub state: SharedState,
    /// The handler's result (only at `AfterAgentRun` / `AgentError`).
    pub result: Option<Arc<AgentResult>>,
    /// The error being reported (at `AgentError` / failed `AfterToolCall`).
    pub error_message: Option<String>,
    /// The tool involved (only at tool-scoped points).
    pub tool_name: Option<String>,
}

impl CallbackArgs {
    /// Create args with only the hook point and state set.
    pub fn new(point: HookPoint, state: SharedState) -> Self {
        Self {
            point,
            event: None,
            agent_id: None,
            state,
            result: None,
            error_message: None,
            tool_name: None,
        }
    }

    /// Attach the event.
    #[must_use]
    pub fn with_event(mut self, event: Arc<Event>) -> Self {
        self.event = Some(event);
        self
    }

    /// Attach the agent id.
    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Attach the handler result.
    #[must_use]
    pub fn with_result(mut self, result: Arc<AgentResult>) -> Self {
        self.result = Some(result);
        self
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attach the tool name.
    #[must_use]
    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }
}

/// A lifecycle callback.
///
/// Callbacks may mutate state: the returned [`SharedState`] replaces the
/// working state for the next callback in the chain (and, at the end of the
/// chain, for the dispatch). Returning an error never aborts the dispatch —
/// the registry records it and continues with the unmodified state.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Called at the registered hook point.
    async fn invoke(
        &self,
        ctx: &ExecutionContext,
        args: CallbackArgs,
    ) -> Result<SharedState, CallbackError>;
}

/// Wrapper that implements [`Callback`] for a closure returning a boxed
/// future.
struct CallbackFn<F> {
    f: F,
}

#[async_trait]
impl<F> Callback for CallbackFn<F>
where
    F: for<'a> Fn(
            &'a ExecutionContext,
            CallbackArgs,
        ) -> BoxFuture<'a, Result<SharedState, CallbackError>>
        + Send
        + Sync,
{
    async fn invoke(
        &self,
        ctx: &ExecutionContext,
        args: CallbackArgs,
    ) -> Result<SharedState, CallbackError> {
        (self.f)(ctx, args).await
    }
}

/// Create a callback from a closure.
///
/// The closure must return a `Box::pin(async move { ... })` future.
#[must_use]
pub fn callback_fn<F>(f: F) -> impl Callback
where
    F: for<'a> Fn(
            &'a ExecutionContext,
            CallbackArgs,
        ) -> BoxFuture<'a, Result<SharedState, CallbackError>>
        + Send
        + Sync,
{
    CallbackFn { f }
}
