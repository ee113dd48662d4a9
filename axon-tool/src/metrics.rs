//! Per-tool invocation metrics.

use serde::Serialize;

/// Counters the registry keeps per tool name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolMetrics {
    /// Invocations that reached a provider (cache hits excluded).
    pub calls: u64,
    /// Invocations that ultimately failed.
    pub failures: u64,
    /// Invocations served from the cache.
    pub cache_hits: u64,
    /// Total wall-clock time across provider-served calls, in milliseconds.
    pub total_duration_ms: u64,
}

impl ToolMetrics {
    /// Mean provider-served call latency in milliseconds.
    pub fn mean_duration_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.calls as f64
        }
    }
}
