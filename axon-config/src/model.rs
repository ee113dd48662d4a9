//! The configuration document schema and its runtime conversions.

use axon_orch::{
    AgentGroup, DispatchMode, ErrorStrategy, GroupMode, KeyMergePolicy, OrchestrationConfig,
    StateMergePolicy,
};
use axon_runner::RunnerConfig;
use axon_tool::{
    CacheConfig, CircuitBreakerConfig, LoadBalanceStrategy, PoolConfig, RetryPolicy,
    ToolRegistryConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}

fn d_noop() -> String {
    "noop".into()
}

fn d_queue_size() -> usize {
    64
}

fn d_one() -> usize {
    1
}

fn d_5000() -> u64 {
    5000
}

fn d_ttl_ms() -> u64 {
    300_000
}

fn d_capacity() -> usize {
    1024
}

fn d_max_connections() -> usize {
    8
}

fn d_60000() -> u64 {
    60_000
}

fn d_10000() -> u64 {
    10_000
}

fn d_retries() -> u32 {
    2
}

fn d_100() -> u64 {
    100
}

fn d_failure_threshold() -> u32 {
    5
}

fn d_30000() -> u64 {
    30_000
}

fn d_success_threshold() -> u32 {
    2
}

fn d_failover() -> u32 {
    2
}

// ── Top-level document ──────────────────────────────────────────────

/// The whole configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM provider descriptor (consumed by external adapters).
    #[serde(default)]
    pub provider: ProviderSection,
    /// Orchestration mode and policy.
    #[serde(default)]
    pub orchestration: OrchestrationSection,
    /// Tool provider descriptors.
    #[serde(default)]
    pub tools: Vec<ToolProviderSection>,
    /// Tool result cache.
    #[serde(default)]
    pub cache: CacheSection,
    /// Tool connection pools.
    #[serde(default)]
    pub pool: PoolSection,
    /// Tool retry policy.
    #[serde(default)]
    pub retry: RetrySection,
    /// Tool circuit breaker.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSection,
    /// Runner queue and workers.
    #[serde(default)]
    pub runner: RunnerSection,
    /// Trace backend.
    #[serde(default)]
    pub trace: TraceSection,
}

// ── Provider ────────────────────────────────────────────────────────

/// Descriptor of the LLM provider an external adapter should construct.
/// The engine itself never interprets `kind`-specific keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    /// Adapter kind (e.g. `"openai"`, `"anthropic"`, `"ollama"`).
    #[serde(default = "d_noop")]
    pub kind: String,
    /// Model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Endpoint override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Kind-specific extra keys, passed through verbatim.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: d_noop(),
            model: None,
            api_key_env: None,
            base_url: None,
            extra: HashMap::new(),
        }
    }
}

// ── Orchestration ───────────────────────────────────────────────────

/// One group of a mixed-mode dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    /// `collaborative` or `sequential`.
    pub mode: GroupMode,
    /// Handler names in the group.
    pub agents: Vec<String>,
}

/// The `[orchestration]` section, mirroring
/// [`OrchestrationConfig`] minus the code-level stop predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestrationSection {
    /// Dispatch mode.
    #[serde(default)]
    pub mode: DispatchMode,
    /// Per-dispatch deadline in milliseconds; 0 = no timeout.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Concurrency cap; 0 = handler count.
    #[serde(default)]
    pub max_concurrency: usize,
    /// Tolerated failing fraction for `continue_on_error` (0.0–1.0).
    #[serde(default)]
    pub failure_threshold: f64,
    /// Loop iteration cap.
    #[serde(default)]
    pub max_iterations: u32,
    /// Handler order for sequential/loop modes.
    #[serde(default)]
    pub agent_order: Vec<String>,
    /// Groups for mixed mode.
    #[serde(default)]
    pub agent_groups: Vec<GroupSection>,
    /// Multi-handler error handling.
    #[serde(default)]
    pub error_strategy: ErrorStrategy,
    /// `overwrite`, `merge`, or `by_key`.
    #[serde(default)]
    pub state_merge: StateMergeKind,
    /// Per-key policies when `state_merge = "by_key"`.
    #[serde(default)]
    pub key_policies: HashMap<String, KeyMergePolicy>,
}

impl Default for OrchestrationSection {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            timeout_ms: 0,
            max_concurrency: 0,
            failure_threshold: 0.0,
            max_iterations: 0,
            agent_order: Vec::new(),
            agent_groups: Vec::new(),
            error_strategy: ErrorStrategy::default(),
            state_merge: StateMergeKind::default(),
            key_policies: HashMap::new(),
        }
    }
}

/// Serializable selector for the state merge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMergeKind {
    /// Keep one handler's output.
    Overwrite,
    /// Fold outputs with `SharedState::merge`.
    #[default]
    Merge,
    /// Use `key_policies`.
    ByKey,
}

impl OrchestrationSection {
    /// Convert into the runtime [`OrchestrationConfig`]. Loop stop
    /// predicates are code; attach one to the result if needed.
    pub fn to_orchestration_config(&self) -> OrchestrationConfig {
        let state_merge = match self.state_merge {
            StateMergeKind::Overwrite => StateMergePolicy::Overwrite,
            StateMergeKind::Merge => StateMergePolicy::Merge,
            StateMergeKind::ByKey => StateMergePolicy::ByKeyPolicy(self.key_policies.clone()),
        };
        OrchestrationConfig {
            mode: self.mode,
            timeout: Duration::from_millis(self.timeout_ms),
            max_concurrency: self.max_concurrency,
            failure_threshold: self.failure_threshold.clamp(0.0, 1.0),
            max_iterations: self.max_iterations,
            stop_predicate: None,
            agent_order: self.agent_order.clone(),
            agent_groups: self
                .agent_groups
                .iter()
                .map(|g| AgentGroup {
                    mode: g.mode,
                    agents: g.agents.clone(),
                })
                .collect(),
            error_strategy: self.error_strategy,
            state_merge,
        }
    }
}

// ── Tools ───────────────────────────────────────────────────────────

/// Transport a tool provider is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTransport {
    /// Pipe-based child process.
    Stdio,
    /// Local TCP endpoint.
    Tcp,
    /// Long-lived unix socket.
    Socket,
    /// Websocket endpoint.
    Websocket,
}

/// One `[[tools]]` entry: a tool provider descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolProviderSection {
    /// Provider id.
    pub name: String,
    /// How to reach the provider.
    pub transport: ToolTransport,
    /// Executable for `stdio` transport.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for `stdio` transport.
    #[serde(default)]
    pub args: Vec<String>,
    /// Endpoint for `tcp`/`socket`/`websocket` transports.
    #[serde(default)]
    pub url: Option<String>,
    /// Disabled providers are parsed but not registered.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Health-check budget in milliseconds.
    #[serde(default = "d_5000")]
    pub ping_timeout_ms: u64,
}

// ── Cache / pool / resilience ───────────────────────────────────────

/// The `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Master switch.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Default TTL in milliseconds.
    #[serde(default = "d_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Per-tool TTL overrides in milliseconds.
    #[serde(default)]
    pub tool_ttls: HashMap<String, u64>,
    /// LRU size cap.
    #[serde(default = "d_capacity")]
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_ms: d_ttl_ms(),
            tool_ttls: HashMap::new(),
            capacity: d_capacity(),
        }
    }
}

impl CacheSection {
    /// Convert into the tool bridge's [`CacheConfig`].
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.enabled,
            capacity: self.capacity,
            default_ttl: Duration::from_millis(self.default_ttl_ms),
            tool_ttls: self
                .tool_ttls
                .iter()
                .map(|(k, v)| (k.clone(), Duration::from_millis(*v)))
                .collect(),
        }
    }
}

/// The `[pool]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
    /// Connections checked out at once, per provider.
    #[serde(default = "d_max_connections")]
    pub max_connections: usize,
    /// Idle discard threshold in milliseconds.
    #[serde(default = "d_60000")]
    pub max_idle_ms: u64,
    /// Dial budget in milliseconds.
    #[serde(default = "d_10000")]
    pub connection_timeout_ms: u64,
    /// Acquire wait budget in milliseconds.
    #[serde(default = "d_5000")]
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_connections: d_max_connections(),
            max_idle_ms: d_60000(),
            connection_timeout_ms: d_10000(),
            acquire_timeout_ms: d_5000(),
        }
    }
}

impl PoolSection {
    /// Convert into the tool bridge's [`PoolConfig`].
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.max_connections,
            max_idle_time: Duration::from_millis(self.max_idle_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }
}

/// The `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    /// Retries after the first attempt.
    #[serde(default = "d_retries")]
    pub max_retries: u32,
    /// Backoff base in milliseconds.
    #[serde(default = "d_100")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "d_5000")]
    pub backoff_max_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: d_retries(),
            base_delay_ms: d_100(),
            backoff_max_ms: d_5000(),
        }
    }
}

/// The `[circuit_breaker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerSection {
    /// Failures within the window that trip the breaker.
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    /// Failure window in milliseconds.
    #[serde(default = "d_60000")]
    pub failure_window_ms: u64,
    /// Open-state hold in milliseconds.
    #[serde(default = "d_30000")]
    pub recovery_timeout_ms: u64,
    /// Half-open successes needed to close.
    #[serde(default = "d_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            failure_window_ms: d_60000(),
            recovery_timeout_ms: d_30000(),
            success_threshold: d_success_threshold(),
        }
    }
}

impl Config {
    /// Assemble the tool bridge configuration from the cache, pool,
    /// retry, and breaker sections.
    pub fn to_tool_registry_config(&self) -> ToolRegistryConfig {
        ToolRegistryConfig {
            cache: self.cache.to_cache_config(),
            pool: self.pool.to_pool_config(),
            breaker: CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                failure_window: Duration::from_millis(self.circuit_breaker.failure_window_ms),
                recovery_timeout: Duration::from_millis(self.circuit_breaker.recovery_timeout_ms),
                success_threshold: self.circuit_breaker.success_threshold,
            },
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                backoff_max: Duration::from_millis(self.retry.backoff_max_ms),
            },
            balance: LoadBalanceStrategy::default(),
            failover_attempts: d_failover(),
            request_timeout: Duration::from_millis(d_30000()),
            shutdown_grace: Duration::from_millis(d_5000()),
        }
    }
}

// ── Runner / trace ──────────────────────────────────────────────────

/// The `[runner]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Bounded queue capacity.
    #[serde(default = "d_queue_size")]
    pub queue_size: usize,
    /// Worker loop count.
    #[serde(default = "d_one")]
    pub workers: usize,
    /// Shutdown grace in milliseconds.
    #[serde(default = "d_5000")]
    pub shutdown_grace_ms: u64,
    /// Attach state snapshots to `event_end` trace entries.
    #[serde(default)]
    pub snapshot_state: bool,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            queue_size: d_queue_size(),
            workers: d_one(),
            shutdown_grace_ms: d_5000(),
            snapshot_state: false,
        }
    }
}

impl RunnerSection {
    /// Convert into the runtime [`RunnerConfig`].
    pub fn to_runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            queue_size: self.queue_size,
            workers: self.workers,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            snapshot_state: self.snapshot_state,
        }
    }
}

/// Trace backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceBackend {
    /// In-memory, optionally bounded.
    #[default]
    Memory,
    /// One `<session_id>.trace` JSONL file per session.
    File,
}

/// The `[trace]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceSection {
    /// Backend choice.
    #[serde(default)]
    pub backend: TraceBackend,
    /// Directory for the file backend.
    #[serde(default)]
    pub path: Option<String>,
    /// Session retention cap for the memory backend.
    #[serde(default)]
    pub retention_sessions: Option<usize>,
}
