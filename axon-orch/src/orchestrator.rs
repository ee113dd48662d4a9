//! The orchestrator — handler registration and mode dispatch.

use crate::config::{DispatchMode, ErrorStrategy, GroupMode, OrchestrationConfig};
use crate::error::OrchError;
use crate::merge::fold_outputs;
use axon_core::{
    AgentHandler, AgentId, AgentResult, CallbackArgs, Event, ExecutionContext, HookPoint,
    SessionId, SharedState, TraceEntry, TraceEntryType, TraceLogger, keys,
    trace::ResultSummary,
};
use axon_hooks::CallbackRegistry;
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Semaphore;

/// Pieces of the orchestrator that spawned handler tasks need; cheap to
/// clone into a task.
#[derive(Clone)]
struct DispatchShared {
    callbacks: Arc<CallbackRegistry>,
    trace: Option<Arc<dyn TraceLogger>>,
}

/// Output of one mode dispatch before it is wrapped into an
/// [`AgentResult`].
struct ModeOutput {
    state: SharedState,
    /// Recoverable failure surfaced by the dispatched handler (route mode
    /// only; multi-handler modes record errors in state or fail hard).
    error_message: Option<String>,
}

impl ModeOutput {
    fn ok(state: SharedState) -> Self {
        Self {
            state,
            error_message: None,
        }
    }
}

/// The decision core: holds the registered handlers and dispatches events
/// to them under the configured policy.
///
/// Handlers register under unique names; registration order is meaningful
/// (it drives collaborative broadcast order and the `Overwrite` merge
/// priority). Duplicate registration is an error — unregister first to
/// replace.
pub struct Orchestrator {
    config: OrchestrationConfig,
    handlers: RwLock<Vec<(String, Arc<dyn AgentHandler>)>>,
    callbacks: Arc<CallbackRegistry>,
    trace: Option<Arc<dyn TraceLogger>>,
}

impl Orchestrator {
    /// Create an orchestrator with the given dispatch policy.
    pub fn new(config: OrchestrationConfig) -> Self {
        Self {
            config,
            handlers: RwLock::new(Vec::new()),
            callbacks: Arc::new(CallbackRegistry::new()),
            trace: None,
        }
    }

    /// Share a callback registry (typically the runner's).
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: Arc<CallbackRegistry>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Emit `agent_start`/`agent_end` (and hook) trace entries to `trace`.
    #[must_use]
    pub fn with_trace(mut self, trace: Arc<dyn TraceLogger>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// The callback registry this orchestrator fires.
    pub fn callbacks(&self) -> Arc<CallbackRegistry> {
        Arc::clone(&self.callbacks)
    }

    /// The dispatch configuration.
    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    fn handlers_read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, Vec<(String, Arc<dyn AgentHandler>)>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler under `name`. Fails on duplicates.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn AgentHandler>,
    ) -> Result<(), OrchError> {
        let name = name.into();
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.iter().any(|(n, _)| *n == name) {
            return Err(OrchError::DuplicateAgent(name));
        }
        handlers.push((name, handler));
        Ok(())
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(n, _)| n != name);
        handlers.len() != before
    }

    /// Registered handler names, in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.handlers_read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Look up a handler by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn AgentHandler>> {
        self.handlers_read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
    }

    fn shared(&self) -> DispatchShared {
        DispatchShared {
            callbacks: Arc::clone(&self.callbacks),
            trace: self.trace.clone(),
        }
    }

    /// Dispatch one event under the configured mode.
    ///
    /// The working state starts empty, seeded with the event's metadata.
    /// The per-dispatch timeout (when nonzero) cancels in-flight handlers
    /// through the derived child context.
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        event: &Event,
    ) -> Result<AgentResult, OrchError> {
        let started = Utc::now();
        let event = Arc::new(event.clone());
        let session = session_of(&event);
        let (child_ctx, cancel) = ctx.descend_cancellable()?;

        let state = SharedState::new();
        for (k, v) in event.metadata() {
            state.set_meta(k.clone(), v.clone());
        }

        let shared = self.shared();
        let state = fire_hook(
            &shared,
            &child_ctx,
            HookPoint::BeforeOrchestration,
            Some(&event),
            None,
            state,
            None,
            None,
            &session,
        )
        .await;

        let work = self.dispatch_inner(&child_ctx, &event, state, &session);
        let outcome = if self.config.timeout.is_zero() {
            work.await
        } else {
            match tokio::time::timeout(self.config.timeout, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    Err(OrchError::DispatchTimeout(
                        self.config.timeout.as_millis() as u64
                    ))
                }
            }
        };

        match outcome {
            Ok(output) => {
                let state = fire_hook(
                    &shared,
                    &child_ctx,
                    HookPoint::AfterOrchestration,
                    Some(&event),
                    None,
                    output.state,
                    None,
                    None,
                    &session,
                )
                .await;
                let mut result = AgentResult::success(state);
                result.error_message = output.error_message;
                result.stamp(started, Utc::now());
                Ok(result)
            }
            Err(e) => {
                fire_hook(
                    &shared,
                    &child_ctx,
                    HookPoint::AfterOrchestration,
                    Some(&event),
                    None,
                    SharedState::new(),
                    None,
                    Some(&e.to_string()),
                    &session,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn dispatch_inner(
        &self,
        ctx: &ExecutionContext,
        event: &Arc<Event>,
        state: SharedState,
        session: &SessionId,
    ) -> Result<ModeOutput, OrchError> {
        match self.config.mode {
            DispatchMode::Route => self.route(ctx, event, state, session).await,
            DispatchMode::Collaborative => {
                let names = self.agent_names();
                let state = self
                    .collaborative_over(ctx, event, names, state, session)
                    .await?;
                Ok(ModeOutput::ok(state))
            }
            DispatchMode::Sequential => {
                let order = self.config.agent_order.clone();
                let state = self.sequential_over(ctx, event, &order, state, session).await?;
                Ok(ModeOutput::ok(state))
            }
            DispatchMode::Loop => {
                let state = self.loop_mode(ctx, event, state, session).await?;
                Ok(ModeOutput::ok(state))
            }
            DispatchMode::Mixed => {
                let mut current = state;
                for group in self.config.agent_groups.clone() {
                    current = match group.mode {
                        GroupMode::Sequential => {
                            self.sequential_over(ctx, event, &group.agents, current, session)
                                .await?
                        }
                        GroupMode::Collaborative => {
                            self.collaborative_over(ctx, event, group.agents, current, session)
                                .await?
                        }
                    };
                }
                Ok(ModeOutput::ok(current))
            }
        }
    }

    /// Route mode: `route_to` target, else a `default` handler, else
    /// [`OrchError::NoRoute`].
    async fn route(
        &self,
        ctx: &ExecutionContext,
        event: &Arc<Event>,
        state: SharedState,
        session: &SessionId,
    ) -> Result<ModeOutput, OrchError> {
        let target = match event.route_to() {
            Some(name) if self.lookup(name).is_some() => name.to_string(),
            _ if self.lookup("default").is_some() => "default".to_string(),
            _ => return Err(OrchError::NoRoute),
        };

        let handler = self
            .lookup(&target)
            .ok_or_else(|| OrchError::UnknownAgent(target.clone()))?;
        let shared = self.shared();
        let result = run_handler(&shared, ctx, event, &target, handler, state, session).await?;
        Ok(ModeOutput {
            state: result.state,
            error_message: result.error_message,
        })
    }

    /// Collaborative broadcast over `names`, respecting the concurrency
    /// cap, error strategy, and merge policy.
    ///
    /// Hard handler errors count as failures; a result with
    /// `error_message` set still contributes its state (and is recorded in
    /// `per_agent_errors` under `CollectAll`). Zero handlers is an empty
    /// success.
    async fn collaborative_over(
        &self,
        ctx: &ExecutionContext,
        event: &Arc<Event>,
        names: Vec<String>,
        state: SharedState,
        session: &SessionId,
    ) -> Result<SharedState, OrchError> {
        if names.is_empty() {
            return Ok(state);
        }

        let permits = if self.config.max_concurrency == 0 {
            names.len()
        } else {
            self.config.max_concurrency
        };
        let semaphore = Arc::new(Semaphore::new(permits.max(1)));
        let (group_ctx, group_cancel) = ctx.descend_cancellable()?;
        let fail_fast = self.config.error_strategy == ErrorStrategy::FailFast;

        let mut handles = Vec::with_capacity(names.len());
        for name in &names {
            let handler = self
                .lookup(name)
                .ok_or_else(|| OrchError::UnknownAgent(name.clone()))?;
            let shared = self.shared();
            let group_ctx = group_ctx.clone();
            let group_cancel = group_cancel.clone();
            let event = Arc::clone(event);
            let session = session.clone();
            let semaphore = Arc::clone(&semaphore);
            let task_state = state.clone();
            let name = name.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(OrchError::Cancelled),
                };
                if group_ctx.is_cancelled() {
                    return Err(OrchError::Cancelled);
                }
                let outcome = run_handler(
                    &shared, &group_ctx, &event, &name, handler, task_state, &session,
                )
                .await;
                if outcome.is_err() && fail_fast {
                    group_cancel.cancel();
                }
                outcome
            }));
        }

        let mut results: Vec<(String, Result<AgentResult, OrchError>)> =
            Vec::with_capacity(names.len());
        for (name, handle) in names.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(OrchError::HandlerFailed {
                    agent: name.clone(),
                    source: axon_core::HandlerError::Failed(format!(
                        "handler task aborted: {join_err}"
                    )),
                }),
            };
            results.push((name.clone(), outcome));
        }

        self.fold_collaborative(state, results)
    }

    /// Apply the error strategy and merge policy to per-handler outcomes
    /// (in registration order).
    fn fold_collaborative(
        &self,
        base: SharedState,
        results: Vec<(String, Result<AgentResult, OrchError>)>,
    ) -> Result<SharedState, OrchError> {
        let total = results.len();
        let mut outputs = Vec::new();
        let mut soft_errors: Vec<(String, String)> = Vec::new();
        let mut hard_errors: Vec<(String, OrchError)> = Vec::new();

        for (name, outcome) in results {
            match outcome {
                Ok(result) => {
                    if let Some(message) = &result.error_message {
                        soft_errors.push((name, message.clone()));
                    }
                    outputs.push(result.state);
                }
                Err(e) => hard_errors.push((name, e)),
            }
        }

        match self.config.error_strategy {
            ErrorStrategy::FailFast => {
                if !hard_errors.is_empty() {
                    // A FailFast cancellation can mark peers Cancelled
                    // before the root cause surfaces; prefer the real error.
                    let picked = hard_errors
                        .iter()
                        .position(|(_, e)| !is_cancellation(e))
                        .unwrap_or(0);
                    return Err(hard_errors.swap_remove(picked).1);
                }
            }
            ErrorStrategy::ContinueOnError => {
                let failed = hard_errors.len();
                let successes = total - failed;
                let required = 1.0 - self.config.failure_threshold;
                if total > 0 && (successes as f64 / total as f64) < required {
                    return Err(OrchError::TooManyFailures { failed, total });
                }
            }
            ErrorStrategy::CollectAll => {}
        }

        let merged = fold_outputs(&self.config.state_merge, &base, outputs);

        if self.config.error_strategy == ErrorStrategy::CollectAll {
            let mut recorded = serde_json::Map::new();
            for (name, message) in &soft_errors {
                recorded.insert(name.clone(), serde_json::json!(message));
            }
            for (name, error) in &hard_errors {
                recorded.insert(name.clone(), serde_json::json!(error.to_string()));
            }
            if !recorded.is_empty() {
                merged.set(keys::PER_AGENT_ERRORS, serde_json::Value::Object(recorded));
            }
        }

        Ok(merged)
    }

    async fn loop_mode(
        &self,
        ctx: &ExecutionContext,
        event: &Arc<Event>,
        state: SharedState,
        session: &SessionId,
    ) -> Result<SharedState, OrchError> {
        if self.config.agent_order.is_empty() {
            return Err(OrchError::InvalidConfig(
                "loop mode requires a non-empty agent_order".into(),
            ));
        }
        let order = self.config.agent_order.clone();
        let mut current = state;
        let mut iterations: u32 = 0;

        while iterations < self.config.max_iterations {
            if let Some(predicate) = &self.config.stop_predicate {
                if predicate(&current) {
                    break;
                }
            }
            if ctx.is_cancelled() {
                return Err(OrchError::Cancelled);
            }

            current = if order.len() == 1 {
                let handler = self
                    .lookup(&order[0])
                    .ok_or_else(|| OrchError::UnknownAgent(order[0].clone()))?;
                let shared = self.shared();
                run_handler(&shared, ctx, event, &order[0], handler, current, session)
                    .await?
                    .state
            } else {
                self.sequential_over(ctx, event, &order, current, session)
                    .await?
            };
            iterations += 1;
        }

        current.set(keys::LOOP_ITERATIONS, serde_json::json!(iterations));
        Ok(current)
    }

    /// Thread state through `order`, aborting on the first hard error
    /// unless the strategy is `ContinueOnError`.
    async fn sequential_over(
        &self,
        ctx: &ExecutionContext,
        event: &Arc<Event>,
        order: &[String],
        state: SharedState,
        session: &SessionId,
    ) -> Result<SharedState, OrchError> {
        let shared = self.shared();
        let mut current = state;
        for name in order {
            if ctx.is_cancelled() {
                return Err(OrchError::Cancelled);
            }
            let handler = self
                .lookup(name)
                .ok_or_else(|| OrchError::UnknownAgent(name.clone()))?;
            match run_handler(&shared, ctx, event, name, handler, current.clone(), session).await {
                Ok(result) => current = result.state,
                Err(e) => {
                    if self.config.error_strategy == ErrorStrategy::ContinueOnError {
                        tracing::debug!(agent = %name, error = %e, "continuing past failed step");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Ok(current)
    }
}

/// Whether an error is (or wraps) a cancellation rather than a real fault.
fn is_cancellation(e: &OrchError) -> bool {
    matches!(e, OrchError::Cancelled)
        || matches!(
            e,
            OrchError::HandlerFailed {
                source: axon_core::HandlerError::Cancelled,
                ..
            }
        )
}

/// Session correlation key of an event (`"default"` when unset).
pub fn session_of(event: &Event) -> SessionId {
    SessionId::from(event.session_id().unwrap_or("default"))
}

#[allow(clippy::too_many_arguments)]
async fn fire_hook(
    shared: &DispatchShared,
    ctx: &ExecutionContext,
    point: HookPoint,
    event: Option<&Arc<Event>>,
    agent: Option<&str>,
    state: SharedState,
    result: Option<Arc<AgentResult>>,
    error: Option<&str>,
    session: &SessionId,
) -> SharedState {
    let mut args = CallbackArgs::new(point, state);
    if let Some(event) = event {
        args = args.with_event(Arc::clone(event));
    }
    if let Some(agent) = agent {
        args = args.with_agent(AgentId::from(agent));
    }
    if let Some(result) = result {
        args = args.with_result(result);
    }
    if let Some(error) = error {
        args = args.with_error(error);
    }

    let outcome = shared.callbacks.fire(ctx, args).await;

    // One `callback` trace entry per firing; failures fold into its error
    // message so the trace stays proportional to the hook traffic.
    let mut entry = TraceEntry::new(TraceEntryType::Callback, session.as_str()).with_hook(point);
    if let Some(event) = event {
        entry = entry
            .with_event(event.id().clone())
            .with_labels(
                event.source().map(str::to_string),
                event.target().map(str::to_string),
            );
    }
    if let Some(agent) = agent {
        entry = entry.with_agent(AgentId::from(agent));
    }
    let failure_text = if outcome.failures.is_empty() {
        error.map(str::to_string)
    } else {
        Some(
            outcome
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.name, f.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    };
    if let Some(text) = failure_text {
        entry = entry.with_error(text);
    }
    log_trace(shared, entry).await;

    outcome.state
}

async fn log_trace(shared: &DispatchShared, entry: TraceEntry) {
    if let Some(trace) = &shared.trace {
        if let Err(e) = trace.log(entry).await {
            tracing::warn!(error = %e, "failed to log trace entry");
        }
    }
}

/// Run one handler with hook bracketing and trace emission:
/// `BeforeAgentRun` → `agent_start` → handler → `agent_end` →
/// `AfterAgentRun` (or `AgentError` on hard failure, whose callbacks
/// cannot suppress the error).
async fn run_handler(
    shared: &DispatchShared,
    ctx: &ExecutionContext,
    event: &Arc<Event>,
    name: &str,
    handler: Arc<dyn AgentHandler>,
    state: SharedState,
    session: &SessionId,
) -> Result<AgentResult, OrchError> {
    let state = fire_hook(
        shared,
        ctx,
        HookPoint::BeforeAgentRun,
        Some(event),
        Some(name),
        state,
        None,
        None,
        session,
    )
    .await;

    log_trace(
        shared,
        TraceEntry::new(TraceEntryType::AgentStart, session.as_str())
            .with_event(event.id().clone())
            .with_agent(AgentId::from(name)),
    )
    .await;

    let started = Utc::now();
    match handler.handle(ctx, event, state.clone()).await {
        Ok(mut result) => {
            result.stamp(started, Utc::now());
            log_trace(
                shared,
                TraceEntry::new(TraceEntryType::AgentEnd, session.as_str())
                    .with_event(event.id().clone())
                    .with_agent(AgentId::from(name))
                    .with_result(ResultSummary {
                        success: result.is_success(),
                        error_message: result.error_message.clone(),
                        duration: result.duration,
                    }),
            )
            .await;

            let result = Arc::new(result);
            let threaded = fire_hook(
                shared,
                ctx,
                HookPoint::AfterAgentRun,
                Some(event),
                Some(name),
                result.state.clone(),
                Some(Arc::clone(&result)),
                result.error_message.as_deref(),
                session,
            )
            .await;

            Ok(AgentResult {
                state: threaded,
                error_message: result.error_message.clone(),
                started_at: result.started_at,
                finished_at: result.finished_at,
                duration: result.duration,
            })
        }
        Err(e) => {
            log_trace(
                shared,
                TraceEntry::new(TraceEntryType::AgentEnd, session.as_str())
                    .with_event(event.id().clone())
                    .with_agent(AgentId::from(name))
                    .with_error(e.to_string()),
            )
            .await;

            // AgentError callbacks observe but cannot suppress: the
            // returned state is discarded and the error propagates.
            fire_hook(
                shared,
                ctx,
                HookPoint::AgentError,
                Some(event),
                Some(name),
                state,
                None,
                Some(&e.to_string()),
                session,
            )
            .await;

            Err(OrchError::HandlerFailed {
                agent: name.to_string(),
                source: e,
            })
        }
    }
}
