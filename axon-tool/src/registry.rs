//! The process-wide tool index and its execute pipeline.

use crate::balance::{LoadBalanceStrategy, ProviderLoad, order_candidates};
use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::cache::{CacheConfig, ToolCache};
use crate::error::ToolError;
use crate::metrics::ToolMetrics;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::provider::ToolProvider;
use crate::retry::RetryPolicy;
use crate::types::{ToolDescriptor, ToolInvocation, ToolResult, canonical_key};
use axon_core::{
    CallbackArgs, ExecutionContext, HookPoint, ProviderId, SessionId, SharedState,
    TraceEntry, TraceEntryType, TraceLogger,
};
use axon_hooks::CallbackRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Registry-wide tuning.
#[derive(Debug, Clone)]
pub struct ToolRegistryConfig {
    /// Result cache settings.
    pub cache: CacheConfig,
    /// Per-provider pool settings.
    pub pool: PoolConfig,
    /// Per-provider circuit breaker settings.
    pub breaker: CircuitBreakerConfig,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// How to pick among providers serving the same tool.
    pub balance: LoadBalanceStrategy,
    /// How many providers an invocation may try before giving up.
    pub failover_attempts: u32,
    /// Budget for one provider round-trip (each retry gets its own).
    pub request_timeout: Duration,
    /// How long shutdown waits for in-flight invocations.
    pub shutdown_grace: Duration,
}

impl Default for ToolRegistryConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            balance: LoadBalanceStrategy::default(),
            failover_attempts: 2,
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Point-in-time health view of one provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    /// The provider.
    pub provider_id: ProviderId,
    /// Breaker state.
    pub circuit: CircuitState,
    /// Calls currently in flight.
    pub inflight: usize,
}

struct ProviderRuntime {
    provider: Arc<dyn ToolProvider>,
    pool: ConnectionPool,
    breaker: CircuitBreaker,
    inflight: AtomicUsize,
}

#[derive(Default)]
struct RegistryIndex {
    /// First-registered descriptor per tool name.
    tools: HashMap<String, ToolDescriptor>,
    /// All providers serving each tool, in registration order.
    tool_providers: HashMap<String, Vec<ProviderId>>,
    /// Recorded registration warnings (e.g. name collisions).
    warnings: Vec<String>,
}

/// The process-wide index mapping tool names to providers, plus the
/// execute pipeline: cache → provider selection → circuit breaker → pool →
/// retry, with `BeforeToolCall`/`AfterToolCall` callbacks bracketing the
/// whole call (retries included).
///
/// Prefer explicit injection over a process global: the runner owns a
/// registry and handlers receive it through their wiring.
pub struct ToolRegistry {
    config: ToolRegistryConfig,
    cache: ToolCache,
    index: RwLock<RegistryIndex>,
    providers: RwLock<HashMap<String, Arc<ProviderRuntime>>>,
    metrics: Mutex<HashMap<String, ToolMetrics>>,
    callbacks: Option<Arc<CallbackRegistry>>,
    trace: Option<Arc<dyn TraceLogger>>,
    rotation: AtomicUsize,
    accepting: AtomicBool,
    inflight_calls: AtomicUsize,
    drained: Notify,
}

impl ToolRegistry {
    /// Create a registry with the given configuration.
    pub fn new(config: ToolRegistryConfig) -> Self {
        let cache = ToolCache::new(config.cache.clone());
        Self {
            config,
            cache,
            index: RwLock::new(RegistryIndex::default()),
            providers: RwLock::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
            callbacks: None,
            trace: None,
            rotation: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            inflight_calls: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Fire `BeforeToolCall`/`AfterToolCall` callbacks on this registry.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: Arc<CallbackRegistry>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Write `tool_start`/`tool_end` trace entries for invocations that
    /// carry a session id.
    #[must_use]
    pub fn with_trace(mut self, trace: Arc<dyn TraceLogger>) -> Self {
        self.trace = Some(trace);
        self
    }

    fn index_read(&self) -> std::sync::RwLockReadGuard<'_, RegistryIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn providers_read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ProviderRuntime>>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a provider: pings it, discovers its tools, and merges them
    /// into the index. Returns the discovered descriptors.
    ///
    /// Tool name collisions across providers resolve first-registered-wins;
    /// the colliding provider is recorded as a failover candidate and a
    /// warning is kept (see [`warnings`](Self::warnings)). A provider hint
    /// on the invocation overrides the index.
    pub async fn register_provider(
        &self,
        provider: Arc<dyn ToolProvider>,
    ) -> Result<Vec<ToolDescriptor>, ToolError> {
        let provider_id = provider.id().clone();
        if self.providers_read().contains_key(provider_id.as_str()) {
            return Err(ToolError::DuplicateProvider(provider_id.to_string()));
        }

        let discovered = provider.list_tools().await?;

        let runtime = Arc::new(ProviderRuntime {
            pool: ConnectionPool::new(Arc::clone(&provider), self.config.pool.clone()),
            breaker: CircuitBreaker::new(self.config.breaker.clone()),
            inflight: AtomicUsize::new(0),
            provider,
        });
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id.as_str().to_string(), runtime);

        let mut index = self.index_write();
        for descriptor in &discovered {
            let entry = index
                .tool_providers
                .entry(descriptor.name.clone())
                .or_default();
            entry.push(provider_id.clone());

            match index.tools.get(&descriptor.name) {
                Some(existing) => {
                    let warning = format!(
                        "tool '{}' from provider '{}' collides with provider '{}'; keeping first registration",
                        descriptor.name, provider_id, existing.provider_id
                    );
                    tracing::warn!("{warning}");
                    index.warnings.push(warning);
                }
                None => {
                    index
                        .tools
                        .insert(descriptor.name.clone(), descriptor.clone());
                }
            }
        }

        Ok(discovered)
    }

    /// All known tool descriptors (first registration per name).
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.index_read().tools.values().cloned().collect()
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<ToolDescriptor> {
        self.index_read().tools.get(name).cloned()
    }

    /// Registration warnings recorded so far.
    pub fn warnings(&self) -> Vec<String> {
        self.index_read().warnings.clone()
    }

    /// Metrics for one tool.
    pub fn metrics(&self, tool: &str) -> Option<ToolMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
            .cloned()
    }

    /// Health snapshot of every registered provider.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.providers_read()
            .iter()
            .map(|(id, rt)| ProviderHealth {
                provider_id: ProviderId::from(id.as_str()),
                circuit: rt.breaker.state(),
                inflight: rt.inflight.load(Ordering::SeqCst),
            })
            .collect()
    }

    /// Ping one provider.
    pub async fn ping(&self, provider: &ProviderId) -> Result<(), ToolError> {
        let runtime = self
            .providers_read()
            .get(provider.as_str())
            .cloned()
            .ok_or_else(|| ToolError::UnknownProvider(provider.to_string()))?;
        runtime.provider.ping().await
    }

    /// Invoke a tool.
    ///
    /// Pipeline: fire `BeforeToolCall` → cache lookup → provider selection
    /// (hint or load balancing) → circuit breaker → pool acquire → send
    /// with retry on transient failures → breaker/metrics/cache updates →
    /// fire `AfterToolCall`. Callbacks bracket the entire call, not each
    /// attempt; cache lookup always precedes provider selection.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        invocation: ToolInvocation,
    ) -> Result<ToolResult, ToolError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ToolError::ShuttingDown);
        }
        let _inflight = CallGuard::enter(self);
        let started = Instant::now();
        let tool = invocation.tool_name.clone();

        self.fire_callbacks(ctx, HookPoint::BeforeToolCall, &tool, None).await;
        self.trace_tool(&invocation, TraceEntryType::ToolStart, None).await;

        let key = canonical_key(&tool, &invocation.arguments);
        if !invocation.bypass_cache {
            if let Some(output) = self.cache.get(&key) {
                self.bump_metrics(&tool, |m| m.cache_hits += 1);
                let result = ToolResult {
                    output,
                    error: None,
                    duration: started.elapsed().into(),
                    was_cached: true,
                };
                self.trace_tool(&invocation, TraceEntryType::ToolEnd, None).await;
                self.fire_callbacks(ctx, HookPoint::AfterToolCall, &tool, None).await;
                return Ok(result);
            }
        }

        let outcome = self.execute_uncached(ctx, &invocation, &key, started).await;

        let error_text = outcome.as_ref().err().map(|e| e.to_string());
        self.trace_tool(&invocation, TraceEntryType::ToolEnd, error_text.as_deref())
            .await;
        self.fire_callbacks(ctx, HookPoint::AfterToolCall, &tool, error_text.as_deref())
            .await;
        outcome
    }

    async fn execute_uncached(
        &self,
        ctx: &ExecutionContext,
        invocation: &ToolInvocation,
        cache_key: &str,
        started: Instant,
    ) -> Result<ToolResult, ToolError> {
        let tool = &invocation.tool_name;
        let candidates = self.candidates_for(invocation)?;
        let max_providers = (self.config.failover_attempts.max(1) as usize).min(candidates.len());

        let mut last_err = ToolError::NotFound(tool.clone());
        for provider_id in candidates.into_iter().take(max_providers) {
            let runtime = match self.providers_read().get(provider_id.as_str()).cloned() {
                Some(rt) => rt,
                None => {
                    last_err = ToolError::UnknownProvider(provider_id.to_string());
                    continue;
                }
            };

            if !runtime.breaker.allow() {
                tracing::debug!(provider = %provider_id, tool = %tool, "circuit open, skipping provider");
                last_err = ToolError::CircuitOpen(provider_id.to_string());
                continue;
            }

            runtime.inflight.fetch_add(1, Ordering::SeqCst);
            let attempt = self.attempt_with_retry(ctx, &runtime, invocation).await;
            runtime.inflight.fetch_sub(1, Ordering::SeqCst);

            match attempt {
                Ok(output) => {
                    runtime.breaker.record_success();
                    let duration = started.elapsed();
                    self.bump_metrics(tool, |m| {
                        m.calls += 1;
                        m.total_duration_ms += duration.as_millis() as u64;
                    });
                    if !invocation.bypass_cache {
                        self.cache.put(tool, cache_key.to_string(), output.clone());
                    }
                    return Ok(ToolResult {
                        output,
                        error: None,
                        duration: duration.into(),
                        was_cached: false,
                    });
                }
                Err(ToolError::Cancelled) => {
                    // Cancellation is not a provider fault; stop immediately.
                    return Err(ToolError::Cancelled);
                }
                Err(e) => {
                    runtime.breaker.record_failure();
                    self.bump_metrics(tool, |m| {
                        m.calls += 1;
                        m.failures += 1;
                    });
                    tracing::debug!(provider = %provider_id, tool = %tool, error = %e, "provider attempt failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    /// Providers eligible for this invocation, best first.
    fn candidates_for(&self, invocation: &ToolInvocation) -> Result<Vec<ProviderId>, ToolError> {
        if let Some(hint) = &invocation.provider_hint {
            if !self.providers_read().contains_key(hint.as_str()) {
                return Err(ToolError::UnknownProvider(hint.to_string()));
            }
            return Ok(vec![hint.clone()]);
        }

        let serving = self
            .index_read()
            .tool_providers
            .get(&invocation.tool_name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(invocation.tool_name.clone()))?;

        let providers = self.providers_read();
        let loads: Vec<ProviderLoad> = serving
            .iter()
            .filter_map(|id| {
                providers.get(id.as_str()).map(|rt| ProviderLoad {
                    provider_id: id.clone(),
                    inflight: rt.inflight.load(Ordering::SeqCst),
                    circuit: rt.breaker.state(),
                    recent_failures: rt.breaker.recent_failures(),
                })
            })
            .collect();
        drop(providers);

        let rotation = self.rotation.fetch_add(1, Ordering::Relaxed);
        Ok(order_candidates(self.config.balance, loads, rotation))
    }

    /// One provider's share of the invocation: pool acquire + send, retried
    /// on transient failures with full-jitter backoff.
    async fn attempt_with_retry(
        &self,
        ctx: &ExecutionContext,
        runtime: &ProviderRuntime,
        invocation: &ToolInvocation,
    ) -> Result<serde_json::Value, ToolError> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            if ctx.is_cancelled() {
                return Err(ToolError::Cancelled);
            }

            let result = self.attempt_once(ctx, runtime, invocation).await;
            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    tracing::debug!(
                        tool = %invocation.tool_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient tool failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancellation().cancelled() => return Err(ToolError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_once(
        &self,
        ctx: &ExecutionContext,
        runtime: &ProviderRuntime,
        invocation: &ToolInvocation,
    ) -> Result<serde_json::Value, ToolError> {
        let mut conn = runtime.pool.acquire().await?;

        let outcome = tokio::select! {
            result = tokio::time::timeout(
                self.config.request_timeout,
                conn.invoke(&invocation.tool_name, &invocation.arguments),
            ) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ToolError::Timeout(self.config.request_timeout.as_millis() as u64)),
            },
            _ = ctx.cancellation().cancelled() => Err(ToolError::Cancelled),
        };

        match outcome {
            Ok(output) => {
                runtime.pool.release(conn).await;
                Ok(output)
            }
            Err(e) => {
                // A connection that just failed is suspect; drop it instead
                // of parking it.
                drop(conn);
                Err(e)
            }
        }
    }

    async fn fire_callbacks(
        &self,
        ctx: &ExecutionContext,
        point: HookPoint,
        tool: &str,
        error: Option<&str>,
    ) {
        if let Some(callbacks) = &self.callbacks {
            let mut args = CallbackArgs::new(point, SharedState::new()).with_tool(tool);
            if let Some(error) = error {
                args = args.with_error(error);
            }
            let outcome = callbacks.fire(ctx, args).await;
            for failure in outcome.failures {
                tracing::warn!(hook = ?failure.hook, callback = %failure.name, "tool callback failed: {}", failure.message);
            }
        }
    }

    async fn trace_tool(
        &self,
        invocation: &ToolInvocation,
        entry_type: TraceEntryType,
        error: Option<&str>,
    ) {
        let (Some(trace), Some(session)) = (&self.trace, &invocation.session_id) else {
            return;
        };
        let mut entry = TraceEntry::new(entry_type, SessionId::from(session.as_str()));
        entry.error_message = error.map(str::to_string);
        if let Err(e) = trace.log(entry).await {
            tracing::warn!(error = %e, "failed to log tool trace entry");
        }
    }

    fn bump_metrics(&self, tool: &str, f: impl FnOnce(&mut ToolMetrics)) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        f(metrics.entry(tool.to_string()).or_default());
    }

    /// Graceful shutdown: stop accepting invocations, wait for in-flight
    /// calls up to the configured grace, then close every pool.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.inflight_calls.load(Ordering::SeqCst) > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    inflight = self.inflight_calls.load(Ordering::SeqCst),
                    "shutdown grace elapsed with tool calls in flight"
                );
                break;
            }
            let _ = tokio::time::timeout(remaining, self.drained.notified()).await;
        }

        for runtime in self.providers_read().values() {
            runtime.pool.close();
        }
    }
}

/// RAII guard around the in-flight counter; notifies shutdown when the
/// last call drains.
struct CallGuard<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> CallGuard<'a> {
    fn enter(registry: &'a ToolRegistry) -> Self {
        registry.inflight_calls.fetch_add(1, Ordering::SeqCst);
        Self { registry }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.registry.inflight_calls.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.registry.drained.notify_waiters();
        }
    }
}
