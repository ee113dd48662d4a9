//! Declarative orchestration configuration.

use axon_core::SharedState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Loop continuation control: return `true` to stop.
pub type StopPredicate = Arc<dyn Fn(&SharedState) -> bool + Send + Sync>;

/// Which dispatch policy the orchestrator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Dispatch to the handler named by the event's `route_to` metadata
    /// (falling back to a handler registered as `default`).
    #[default]
    Route,
    /// Broadcast to every registered handler concurrently and merge.
    Collaborative,
    /// Run handlers in `agent_order`, threading state step to step.
    Sequential,
    /// Run one handler (or a sequential group) repeatedly under a stop
    /// predicate and iteration cap.
    Loop,
    /// Run `agent_groups` sequentially, each group under its own mode.
    Mixed,
}

/// How multi-handler errors are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Cancel remaining handlers and fail on the first error.
    #[default]
    FailFast,
    /// Keep going; succeed if enough handlers succeeded (see
    /// [`OrchestrationConfig::failure_threshold`]).
    ContinueOnError,
    /// Always succeed; record per-handler errors in the merged state under
    /// the `per_agent_errors` key.
    CollectAll,
}

/// Per-key policy for [`StateMergePolicy::ByKeyPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMergePolicy {
    /// Later output wins (the default for unlisted keys).
    LastWins,
    /// First output to set the key wins.
    FirstWins,
    /// Collect values into a list, in merge order.
    AppendToList,
    /// Sum numeric values; non-numeric values fall back to last-wins.
    SumNumeric,
}

/// How multi-handler output states fold into one.
#[derive(Debug, Clone, Default)]
pub enum StateMergePolicy {
    /// Keep a single handler's output — the first completed output in
    /// registration order.
    Overwrite,
    /// Apply [`SharedState::merge`] left-to-right in registration order.
    #[default]
    Merge,
    /// Per-key policies; unlisted keys behave as
    /// [`KeyMergePolicy::LastWins`].
    ByKeyPolicy(HashMap<String, KeyMergePolicy>),
}

/// The mode a group in [`OrchestrationConfig::agent_groups`] runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Broadcast to the group's handlers concurrently.
    Collaborative,
    /// Thread state through the group's handlers in order.
    Sequential,
}

/// One group of a mixed-mode dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentGroup {
    /// How the group executes internally.
    pub mode: GroupMode,
    /// The handlers in the group.
    pub agents: Vec<String>,
}

/// Declarative dispatch policy.
///
/// `timeout == Duration::ZERO` means *no timeout* — a zero-grace dispatch
/// deadline would be indistinguishable from an immediate failure, so zero
/// is read as unbounded.
#[derive(Clone, Default)]
pub struct OrchestrationConfig {
    /// The dispatch policy.
    pub mode: DispatchMode,
    /// Per-dispatch deadline. Zero = no timeout.
    pub timeout: Duration,
    /// Cap on concurrent handler invocations (collaborative/mixed).
    /// Zero = no cap beyond the handler count.
    pub max_concurrency: usize,
    /// Fraction of handlers that may fail before a `ContinueOnError`
    /// dispatch is declared failed (0.0–1.0).
    pub failure_threshold: f64,
    /// Iteration cap for loop mode.
    pub max_iterations: u32,
    /// Loop continuation control.
    pub stop_predicate: Option<StopPredicate>,
    /// Explicit handler order for sequential and loop modes.
    pub agent_order: Vec<String>,
    /// Groups for mixed mode.
    pub agent_groups: Vec<AgentGroup>,
    /// Multi-handler error handling.
    pub error_strategy: ErrorStrategy,
    /// Multi-handler output folding.
    pub state_merge: StateMergePolicy,
}

impl fmt::Debug for OrchestrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationConfig")
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("failure_threshold", &self.failure_threshold)
            .field("max_iterations", &self.max_iterations)
            .field(
                "stop_predicate",
                &self.stop_predicate.as_ref().map(|_| "<fn>"),
            )
            .field("agent_order", &self.agent_order)
            .field("agent_groups", &self.agent_groups)
            .field("error_strategy", &self.error_strategy)
            .finish_non_exhaustive()
    }
}

impl OrchestrationConfig {
    /// Route-mode config.
    pub fn route() -> Self {
        Self {
            mode: DispatchMode::Route,
            ..Self::default()
        }
    }

    /// Collaborative-mode config.
    pub fn collaborative() -> Self {
        Self {
            mode: DispatchMode::Collaborative,
            ..Self::default()
        }
    }

    /// Sequential-mode config over the given handler order.
    pub fn sequential(agent_order: Vec<String>) -> Self {
        Self {
            mode: DispatchMode::Sequential,
            agent_order,
            ..Self::default()
        }
    }

    /// Loop-mode config over the given handler order.
    pub fn loop_over(agent_order: Vec<String>, max_iterations: u32) -> Self {
        Self {
            mode: DispatchMode::Loop,
            agent_order,
            max_iterations,
            ..Self::default()
        }
    }

    /// Mixed-mode config over the given groups.
    pub fn mixed(agent_groups: Vec<AgentGroup>) -> Self {
        Self {
            mode: DispatchMode::Mixed,
            agent_groups,
            ..Self::default()
        }
    }

    /// Set the dispatch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency cap.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the error strategy.
    #[must_use]
    pub fn with_error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Set the state merge policy.
    #[must_use]
    pub fn with_state_merge(mut self, policy: StateMergePolicy) -> Self {
        self.state_merge = policy;
        self
    }

    /// Set the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: f64) -> Self {
        self.failure_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the loop stop predicate.
    #[must_use]
    pub fn with_stop_predicate(
        mut self,
        predicate: impl Fn(&SharedState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.stop_predicate = Some(Arc::new(predicate));
        self
    }
}
