//! Tool result cache — LRU within a size cap, TTL per tool.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; a disabled cache never hits and never fills.
    pub enabled: bool,
    /// Maximum number of cached results (LRU eviction beyond this).
    pub capacity: usize,
    /// TTL applied to tools without a per-tool override.
    pub default_ttl: Duration,
    /// Per-tool TTL overrides. A zero TTL disables caching for that tool.
    pub tool_ttls: HashMap<String, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
            default_ttl: Duration::from_secs(300),
            tool_ttls: HashMap::new(),
        }
    }
}

struct CachedResult {
    output: serde_json::Value,
    stored_at: Instant,
    ttl: Duration,
}

/// LRU + TTL cache keyed by canonicalized invocation
/// (see [`canonical_key`](crate::types::canonical_key)).
pub struct ToolCache {
    config: CacheConfig,
    inner: Mutex<LruCache<String, CachedResult>>,
}

impl ToolCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CachedResult>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The TTL in effect for a tool.
    pub fn ttl_for(&self, tool: &str) -> Duration {
        self.config
            .tool_ttls
            .get(tool)
            .copied()
            .unwrap_or(self.config.default_ttl)
    }

    /// Look up a cached output. Expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.lock();
        match inner.get(key) {
            Some(cached) if cached.stored_at.elapsed() < cached.ttl => Some(cached.output.clone()),
            Some(_) => {
                inner.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store an output under `key` with the TTL in effect for `tool`.
    /// No-op when the cache is disabled or the tool's TTL is zero.
    pub fn put(&self, tool: &str, key: String, output: serde_json::Value) {
        if !self.config.enabled {
            return;
        }
        let ttl = self.ttl_for(tool);
        if ttl.is_zero() {
            return;
        }
        self.lock().put(
            key,
            CachedResult {
                output,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
