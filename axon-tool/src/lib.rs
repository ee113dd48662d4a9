#![deny(missing_docs)]
//! Tool-integration bridge for axon.
//!
//! Handlers discover and invoke out-of-process tools through a
//! [`ToolRegistry`]: providers advertise tools ([`ToolProvider`]), the
//! registry indexes them by name, and [`ToolRegistry::execute`] runs the
//! full reliability pipeline — result cache, load-balanced provider
//! selection, per-provider circuit breaker, bounded connection pool, and
//! retry with full-jitter backoff.
//!
//! The wire format of any particular provider transport is out of scope;
//! implement [`ToolProvider`]/[`ToolConnection`] over whatever transport
//! the provider speaks (child process pipe, local TCP, websocket).

mod balance;
mod breaker;
mod cache;
mod error;
mod local;
mod metrics;
mod pool;
mod provider;
mod registry;
mod retry;
mod types;

pub use balance::{LoadBalanceStrategy, ProviderLoad, order_candidates};
pub use local::{LocalTool, LocalToolProvider, local_tool};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cache::{CacheConfig, ToolCache};
pub use error::ToolError;
pub use metrics::ToolMetrics;
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use provider::{ToolConnection, ToolProvider};
pub use registry::{ProviderHealth, ToolRegistry, ToolRegistryConfig};
pub use retry::RetryPolicy;
pub use types::{ArgumentMap, ToolDescriptor, ToolInvocation, ToolResult, canonical_key};
