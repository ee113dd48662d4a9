//! Loop composition of a single sub-handler.

use async_trait::async_trait;
use axon_core::{AgentHandler, AgentResult, Event, ExecutionContext, HandlerError, SharedState};
use std::sync::Arc;

/// Continuation control for [`LoopHandler`]: return `true` to stop.
pub type LoopStopPredicate = Arc<dyn Fn(&SharedState) -> bool + Send + Sync>;

/// Runs one sub-handler repeatedly, threading state between iterations.
///
/// The stop predicate is evaluated before each iteration; the loop ends
/// when it returns `true` or the iteration cap is reached. With
/// `max_iterations == 0` the sub-handler never runs and the input state
/// passes through unchanged.
pub struct LoopHandler {
    sub: Arc<dyn AgentHandler>,
    max_iterations: u32,
    stop: Option<LoopStopPredicate>,
}

impl LoopHandler {
    /// Loop `sub` up to `max_iterations` times.
    pub fn new(sub: Arc<dyn AgentHandler>, max_iterations: u32) -> Self {
        Self {
            sub,
            max_iterations,
            stop: None,
        }
    }

    /// Stop early once `predicate(state)` is true.
    #[must_use]
    pub fn with_stop_predicate(
        mut self,
        predicate: impl Fn(&SharedState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.stop = Some(Arc::new(predicate));
        self
    }
}

#[async_trait]
impl AgentHandler for LoopHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        let ctx = ctx.descend()?;
        let mut current = state;
        let mut iterations = 0u32;

        while iterations < self.max_iterations {
            if let Some(stop) = &self.stop {
                if stop(&current) {
                    break;
                }
            }
            if ctx.is_cancelled() {
                return Err(HandlerError::Cancelled);
            }
            let result = self.sub.handle(&ctx, event, current).await?;
            if result.error_message.is_some() {
                return Ok(result);
            }
            current = result.state;
            iterations += 1;
        }

        Ok(AgentResult::success(current))
    }
}
