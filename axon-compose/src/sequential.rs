//! Sequential composition of sub-handlers.

use async_trait::async_trait;
use axon_core::{AgentHandler, AgentResult, Event, ExecutionContext, HandlerError, SharedState};
use std::sync::Arc;

/// Runs sub-handlers in order, threading each output state into the next.
///
/// Stops at the first failure: a hard error propagates as this handler's
/// error; a recoverable failure (`error_message` set) stops the chain and
/// returns the partial state accumulated so far.
pub struct SequentialHandler {
    subs: Vec<Arc<dyn AgentHandler>>,
}

impl SequentialHandler {
    /// Compose the given sub-handlers, run first to last.
    pub fn new(subs: Vec<Arc<dyn AgentHandler>>) -> Self {
        Self { subs }
    }
}

#[async_trait]
impl AgentHandler for SequentialHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        let ctx = ctx.descend()?;
        let mut current = state;
        for sub in &self.subs {
            if ctx.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            let result = sub.handle(&ctx, event, current).await?;
            if result.error_message.is_some() {
                // Recoverable failure: surface the partial state for routing.
                return Ok(result);
            }
            current = result.state;
        }
        Ok(AgentResult::success(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::handler_fn;
    use axon_core::test_utils::FailingHandler;
    use serde_json::json;

    fn appender(tag: &'static str) -> Arc<dyn AgentHandler> {
        Arc::new(handler_fn(move |_ctx, _event, state| {
            Box::pin(async move {
                let mut trail = state
                    .get("trail")
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                trail.push(json!(tag));
                state.set("trail", json!(trail));
                Ok(AgentResult::success(state))
            })
        }))
    }

    #[tokio::test]
    async fn threads_state_through_subs() {
        let handler = SequentialHandler::new(vec![appender("a"), appender("b"), appender("c")]);
        let result = handler
            .handle(
                &ExecutionContext::new(),
                &Event::builder().build(),
                SharedState::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.state.get("trail"), Some(json!(["a", "b", "c"])));
    }

    #[tokio::test]
    async fn hard_error_propagates() {
        let handler = SequentialHandler::new(vec![
            appender("a"),
            Arc::new(FailingHandler::new("mid")),
            appender("c"),
        ]);
        let err = handler
            .handle(
                &ExecutionContext::new(),
                &Event::builder().build(),
                SharedState::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }

    #[tokio::test]
    async fn recoverable_failure_returns_partial_state() {
        let soft_fail = Arc::new(handler_fn(|_ctx, _event, state| {
            Box::pin(async move { Ok(AgentResult::failure(state, "soft")) })
        }));
        let handler = SequentialHandler::new(vec![appender("a"), soft_fail, appender("c")]);
        let result = handler
            .handle(
                &ExecutionContext::new(),
                &Event::builder().build(),
                SharedState::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.error_message.as_deref(), Some("soft"));
        assert_eq!(result.state.get("trail"), Some(json!(["a"])));
    }

    #[tokio::test]
    async fn depth_cap_stops_runaway_nesting() {
        // A sequential handler over itself would recurse; the depth cap
        // cuts it off.
        let leaf = appender("leaf");
        let mut nested: Arc<dyn AgentHandler> = leaf;
        for _ in 0..20 {
            nested = Arc::new(SequentialHandler::new(vec![nested]));
        }
        let err = nested
            .handle(
                &ExecutionContext::new(),
                &Event::builder().build(),
                SharedState::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::DepthExceeded { .. }));
    }
}
