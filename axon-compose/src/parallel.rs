//! Parallel composition of sub-handlers.

use async_trait::async_trait;
use axon_core::{
    AgentHandler, AgentResult, Event, ExecutionContext, HandlerError, SharedState, keys,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// How a [`ParallelHandler`] resolves its sub-results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelStrategy {
    /// Return the first sub-handler to succeed; cancel the rest.
    FirstSuccess,
    /// Wait for every sub-handler; merge successful outputs in sub order
    /// and record failures under the `per_agent_errors` state key.
    #[default]
    CollectAll,
    /// Cancel everything and fail on the first sub-handler error.
    FailFast,
}

/// Runs sub-handlers concurrently, each on its own clone of the input
/// state, and folds the outcomes under a [`ParallelStrategy`].
///
/// An optional timeout cancels in-flight sub-handlers; what happens then
/// depends on the strategy (`FirstSuccess`/`FailFast` fail with
/// [`HandlerError::Timeout`], `CollectAll` keeps the results that
/// completed and records the rest as failures).
pub struct ParallelHandler {
    subs: Vec<Arc<dyn AgentHandler>>,
    strategy: ParallelStrategy,
    timeout: Option<Duration>,
}

impl ParallelHandler {
    /// Compose the given sub-handlers under the default `CollectAll`
    /// strategy.
    pub fn new(subs: Vec<Arc<dyn AgentHandler>>) -> Self {
        Self {
            subs,
            strategy: ParallelStrategy::default(),
            timeout: None,
        }
    }

    /// Set the resolution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ParallelStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Cancel sub-handlers still running after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run_subs(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: &SharedState,
    ) -> Result<AgentResult, HandlerError> {
        let (child_ctx, cancel) = ctx.descend_cancellable()?;
        let event = Arc::new(event.clone());

        let mut set = JoinSet::new();
        for (index, sub) in self.subs.iter().enumerate() {
            let sub = Arc::clone(sub);
            let ctx = child_ctx.clone();
            let event = Arc::clone(&event);
            let task_state = state.clone();
            set.spawn(async move { (index, sub.handle(&ctx, &event, task_state).await) });
        }

        let mut outputs: Vec<Option<AgentResult>> = (0..self.subs.len()).map(|_| None).collect();
        let mut failures: Vec<(usize, String)> = Vec::new();

        while let Some(joined) = set.join_next().await {
            let (index, outcome) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    if self.strategy == ParallelStrategy::FailFast {
                        cancel.cancel();
                        return Err(HandlerError::Failed(format!(
                            "parallel sub-handler aborted: {join_err}"
                        )));
                    }
                    continue;
                }
            };

            match outcome {
                Ok(result) => {
                    if self.strategy == ParallelStrategy::FirstSuccess && result.is_success() {
                        cancel.cancel();
                        return Ok(result);
                    }
                    outputs[index] = Some(result);
                }
                Err(e) => match self.strategy {
                    ParallelStrategy::FailFast => {
                        cancel.cancel();
                        return Err(e);
                    }
                    _ => failures.push((index, e.to_string())),
                },
            }
        }

        match self.strategy {
            ParallelStrategy::FirstSuccess => Err(HandlerError::Failed(format!(
                "no parallel sub-handler succeeded ({} failures)",
                failures.len()
            ))),
            ParallelStrategy::FailFast | ParallelStrategy::CollectAll => {
                let merged = state.clone();
                for output in outputs.into_iter().flatten() {
                    merged.merge(&output.state);
                }
                if !failures.is_empty() {
                    let mut recorded = serde_json::Map::new();
                    for (index, message) in &failures {
                        recorded.insert(format!("sub{index}"), serde_json::json!(message));
                    }
                    merged.set(keys::PER_AGENT_ERRORS, serde_json::Value::Object(recorded));
                }
                Ok(AgentResult::success(merged))
            }
        }
    }
}

#[async_trait]
impl AgentHandler for ParallelHandler {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
        state: SharedState,
    ) -> Result<AgentResult, HandlerError> {
        match self.timeout {
            None => self.run_subs(ctx, event, &state).await,
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.run_subs(ctx, event, &state)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(HandlerError::Timeout(timeout.as_millis() as u64)),
                }
            }
        }
    }
}
