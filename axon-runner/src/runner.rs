//! The Runner — queue, workers, lifecycle.

use axon_core::{
    AgentHandler, AgentResult, CallbackArgs, Event, ExecutionContext, HookPoint, SessionId,
    SharedState, TraceEntry, TraceEntryType, TraceError, TraceLogger,
    trace::ResultSummary,
};
use axon_hooks::CallbackRegistry;
use axon_orch::{OrchError, Orchestrator, session_of};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bounded queue capacity; a full queue rejects emissions.
    pub queue_size: usize,
    /// Worker loops pulling from the queue. With one worker, events
    /// dispatch in emission order; more workers trade ordering for
    /// throughput.
    pub workers: usize,
    /// How long [`Runner::stop`] waits for in-flight dispatches before
    /// cancelling them.
    pub shutdown_grace: Duration,
    /// Attach a JSON state snapshot to `event_end` trace entries.
    pub snapshot_state: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            queue_size: 64,
            workers: 1,
            shutdown_grace: Duration::from_secs(5),
            snapshot_state: false,
        }
    }
}

/// Runner lifecycle and queue errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The queue is at capacity; the emission was rejected, not blocked.
    #[error("event queue full")]
    QueueFull,

    /// The runner has not been started (or has been stopped).
    #[error("runner not started")]
    NotStarted,

    /// The runner is already running.
    #[error("runner already started")]
    AlreadyStarted,

    /// A registration error from the underlying orchestrator.
    #[error(transparent)]
    Orch(#[from] OrchError),
}

/// Queued execution driver.
///
/// Owns the event queue and the callback registry (shared down into the
/// orchestrator); exclusive owner of the worker pool. Construct through
/// [`RunnerBuilder`](crate::RunnerBuilder).
pub struct Runner {
    config: RunnerConfig,
    orchestrator: Arc<Orchestrator>,
    callbacks: Arc<CallbackRegistry>,
    trace: Arc<dyn TraceLogger>,
    tx: Mutex<Option<mpsc::Sender<Arc<Event>>>>,
    workers: Mutex<Option<JoinSet<()>>>,
    root: Mutex<Option<CancellationToken>>,
    inflight: Arc<AtomicUsize>,
}

impl Runner {
    pub(crate) fn assemble(
        config: RunnerConfig,
        orchestrator: Arc<Orchestrator>,
        trace: Arc<dyn TraceLogger>,
    ) -> Self {
        let callbacks = orchestrator.callbacks();
        Self {
            config,
            orchestrator,
            callbacks,
            trace,
            tx: Mutex::new(None),
            workers: Mutex::new(None),
            root: Mutex::new(None),
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a handler with the underlying orchestrator.
    pub fn register_agent(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn AgentHandler>,
    ) -> Result<(), RunnerError> {
        self.orchestrator.register(name, handler)?;
        Ok(())
    }

    /// The callback registry shared between runner and orchestrator.
    pub fn callbacks(&self) -> Arc<CallbackRegistry> {
        Arc::clone(&self.callbacks)
    }

    /// The orchestrator this runner dispatches through.
    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// The trace logger.
    pub fn trace(&self) -> Arc<dyn TraceLogger> {
        Arc::clone(&self.trace)
    }

    /// All trace entries for a session, in insertion order.
    pub async fn dump_trace(&self, session_id: &SessionId) -> Result<Vec<TraceEntry>, TraceError> {
        self.trace.traces(session_id).await
    }

    /// Spawn the worker pool. Fails if already started.
    pub fn start(&self) -> Result<(), RunnerError> {
        let mut tx_slot = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx_slot.is_some() {
            return Err(RunnerError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel::<Arc<Event>>(self.config.queue_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let root = CancellationToken::new();

        let mut set = JoinSet::new();
        for worker_id in 0..self.config.workers.max(1) {
            let ctx = WorkerContext {
                orchestrator: Arc::clone(&self.orchestrator),
                callbacks: Arc::clone(&self.callbacks),
                trace: Arc::clone(&self.trace),
                inflight: Arc::clone(&self.inflight),
                snapshot_state: self.config.snapshot_state,
                root: root.clone(),
            };
            let rx = Arc::clone(&rx);
            set.spawn(async move {
                worker_loop(worker_id, ctx, rx).await;
            });
        }

        *tx_slot = Some(tx);
        *self.workers.lock().unwrap_or_else(PoisonError::into_inner) = Some(set);
        *self.root.lock().unwrap_or_else(PoisonError::into_inner) = Some(root);
        Ok(())
    }

    /// Enqueue an event. Never blocks on dispatch: a full queue returns
    /// [`RunnerError::QueueFull`] immediately.
    pub async fn emit(&self, event: Event) -> Result<(), RunnerError> {
        let event = Arc::new(event);
        let tx = {
            let slot = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            slot.clone().ok_or(RunnerError::NotStarted)?
        };

        match tx.try_send(Arc::clone(&event)) {
            Ok(()) => {
                let entry = TraceEntry::new(
                    TraceEntryType::EventEnqueued,
                    session_of(&event).as_str(),
                )
                .with_event(event.id().clone())
                .with_labels(
                    event.source().map(str::to_string),
                    event.target().map(str::to_string),
                );
                if let Err(e) = self.trace.log(entry).await {
                    tracing::warn!(error = %e, "failed to log enqueue trace entry");
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(RunnerError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RunnerError::NotStarted),
        }
    }

    /// Graceful shutdown: stop accepting events, let workers drain the
    /// queue and finish in-flight dispatches up to the shutdown grace,
    /// then cancel whatever is left. Returns only after the workers exit.
    pub async fn stop(&self) {
        // Closing the channel lets workers drain and exit naturally.
        drop(
            self.tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let root = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let set = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut set) = set else {
            return;
        };

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        inflight = self.inflight.load(Ordering::SeqCst),
                        "shutdown grace elapsed, cancelling in-flight dispatches"
                    );
                    if let Some(root) = &root {
                        root.cancel();
                    }
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    break;
                }
            }
        }

        if let Some(root) = root {
            root.cancel();
        }
    }
}

/// Everything a worker needs, cloned out of the runner at start.
struct WorkerContext {
    orchestrator: Arc<Orchestrator>,
    callbacks: Arc<CallbackRegistry>,
    trace: Arc<dyn TraceLogger>,
    inflight: Arc<AtomicUsize>,
    snapshot_state: bool,
    root: CancellationToken,
}

async fn worker_loop(
    worker_id: usize,
    ctx: WorkerContext,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<Event>>>>,
) {
    loop {
        let event = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = ctx.root.cancelled() => return,
                msg = rx.recv() => match msg {
                    Some(event) => event,
                    None => return,
                },
            }
        };
        process_event(worker_id, &ctx, event).await;
    }
}

async fn process_event(worker_id: usize, ctx: &WorkerContext, event: Arc<Event>) {
    let session = session_of(&event);
    ctx.inflight.fetch_add(1, Ordering::SeqCst);

    log(
        ctx,
        TraceEntry::new(TraceEntryType::EventStart, session.as_str())
            .with_event(event.id().clone())
            .with_labels(
                event.source().map(str::to_string),
                event.target().map(str::to_string),
            ),
    )
    .await;

    let dispatch_ctx = ExecutionContext::with_cancellation(ctx.root.child_token());
    fire_event_hook(ctx, &dispatch_ctx, HookPoint::BeforeEventHandling, &event, None, None, &session)
        .await;

    // The dispatch runs in its own task so a panicking handler takes down
    // neither the worker nor its queue slot.
    let orchestrator = Arc::clone(&ctx.orchestrator);
    let dispatch_event = Arc::clone(&event);
    let task_ctx = dispatch_ctx.clone();
    let handle =
        tokio::spawn(async move { orchestrator.dispatch(&task_ctx, &dispatch_event).await });

    match handle.await {
        Ok(Ok(result)) => {
            let mut entry = TraceEntry::new(TraceEntryType::EventEnd, session.as_str())
                .with_event(event.id().clone())
                .with_result(ResultSummary {
                    success: result.is_success(),
                    error_message: result.error_message.clone(),
                    duration: result.duration,
                });
            if ctx.snapshot_state {
                entry = entry.with_snapshot(result.state.to_json());
            }
            log(ctx, entry).await;
            fire_event_hook(
                ctx,
                &dispatch_ctx,
                HookPoint::AfterEventHandling,
                &event,
                Some(Arc::new(result)),
                None,
                &session,
            )
            .await;
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            log(
                ctx,
                TraceEntry::new(TraceEntryType::Error, session.as_str())
                    .with_event(event.id().clone())
                    .with_error(&message),
            )
            .await;
            log(
                ctx,
                TraceEntry::new(TraceEntryType::EventEnd, session.as_str())
                    .with_event(event.id().clone())
                    .with_error(&message),
            )
            .await;
            fire_event_hook(
                ctx,
                &dispatch_ctx,
                HookPoint::AfterEventHandling,
                &event,
                None,
                Some(&message),
                &session,
            )
            .await;
        }
        Err(join_err) => {
            // Panic isolation: record and keep serving.
            let message = if join_err.is_panic() {
                format!("internal: dispatch panicked: {}", panic_text(join_err))
            } else {
                format!("internal: dispatch aborted: {join_err}")
            };
            tracing::error!(worker = worker_id, event = %event.id(), "{message}");
            log(
                ctx,
                TraceEntry::new(TraceEntryType::Error, session.as_str())
                    .with_event(event.id().clone())
                    .with_error(&message),
            )
            .await;
            log(
                ctx,
                TraceEntry::new(TraceEntryType::EventEnd, session.as_str())
                    .with_event(event.id().clone())
                    .with_error(&message),
            )
            .await;
        }
    }

    ctx.inflight.fetch_sub(1, Ordering::SeqCst);
}

fn panic_text(join_err: tokio::task::JoinError) -> String {
    match join_err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(e) => e.to_string(),
    }
}

async fn fire_event_hook(
    ctx: &WorkerContext,
    dispatch_ctx: &ExecutionContext,
    point: HookPoint,
    event: &Arc<Event>,
    result: Option<Arc<AgentResult>>,
    error: Option<&str>,
    session: &SessionId,
) {
    let state = result
        .as_ref()
        .map(|r| r.state.clone())
        .unwrap_or_default();
    let mut args = CallbackArgs::new(point, state).with_event(Arc::clone(event));
    if let Some(result) = result {
        args = args.with_result(result);
    }
    if let Some(error) = error {
        args = args.with_error(error);
    }

    let outcome = ctx.callbacks.fire(dispatch_ctx, args).await;
    for failure in outcome.failures {
        log(
            ctx,
            TraceEntry::new(TraceEntryType::Callback, session.as_str())
                .with_event(event.id().clone())
                .with_hook(failure.hook)
                .with_error(format!("{}: {}", failure.name, failure.message)),
        )
        .await;
    }
}

async fn log(ctx: &WorkerContext, entry: TraceEntry) {
    if let Err(e) = ctx.trace.log(entry).await {
        tracing::warn!(error = %e, "failed to log trace entry");
    }
}
