//! Builder wiring a runner, orchestrator, callbacks, and trace backend.

use crate::runner::{Runner, RunnerConfig};
use axon_core::TraceLogger;
use axon_orch::{OrchestrationConfig, Orchestrator};
use axon_trace::MemoryTraceLogger;
use std::sync::Arc;
use std::time::Duration;

/// Builds a [`Runner`].
///
/// The builder constructs the orchestrator from the supplied
/// [`OrchestrationConfig`], shares one callback registry between runner
/// and orchestrator, and defaults the trace backend to an in-memory
/// logger.
pub struct RunnerBuilder {
    config: RunnerConfig,
    orchestration: OrchestrationConfig,
    trace: Option<Arc<dyn TraceLogger>>,
}

impl RunnerBuilder {
    /// Start with defaults: route mode, queue of 64, one worker.
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            orchestration: OrchestrationConfig::default(),
            trace: None,
        }
    }

    /// Set the dispatch policy.
    #[must_use]
    pub fn orchestration(mut self, orchestration: OrchestrationConfig) -> Self {
        self.orchestration = orchestration;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.config.queue_size = queue_size;
        self
    }

    /// Set the worker count. One worker preserves emission order.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the shutdown grace.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Attach JSON state snapshots to `event_end` trace entries.
    #[must_use]
    pub fn snapshot_state(mut self, snapshot: bool) -> Self {
        self.config.snapshot_state = snapshot;
        self
    }

    /// Use a specific trace backend (defaults to
    /// [`MemoryTraceLogger`]).
    #[must_use]
    pub fn trace(mut self, trace: Arc<dyn TraceLogger>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Assemble the runner (not yet started).
    pub fn build(self) -> Runner {
        let trace = self
            .trace
            .unwrap_or_else(|| Arc::new(MemoryTraceLogger::new()));
        let orchestrator = Arc::new(
            Orchestrator::new(self.orchestration).with_trace(Arc::clone(&trace)),
        );
        Runner::assemble(self.config, orchestrator, trace)
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
