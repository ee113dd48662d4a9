//! Bounded per-provider connection pool.

use crate::error::ToolError;
use crate::provider::{ToolConnection, ToolProvider};
use crate::types::ArgumentMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool tuning.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on connections checked out at once.
    pub max_connections: usize,
    /// Idle connections parked longer than this are discarded on reuse.
    pub max_idle_time: Duration,
    /// Budget for establishing a fresh connection.
    pub connection_timeout: Duration,
    /// How long an acquire may wait for a free slot.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            max_idle_time: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

struct IdleConnection {
    conn: Box<dyn ToolConnection>,
    parked_at: Instant,
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Return it with [`ConnectionPool::release`] after use; dropping it
/// instead discards the connection (the concurrency slot is freed either
/// way).
pub struct PooledConnection {
    conn: Box<dyn ToolConnection>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl PooledConnection {
    /// Execute a tool on this connection.
    pub async fn invoke(
        &mut self,
        tool: &str,
        arguments: &ArgumentMap,
    ) -> Result<serde_json::Value, ToolError> {
        self.conn.invoke(tool, arguments).await
    }
}

/// Bounded pool of live connections to one provider.
///
/// Acquisition blocks up to `acquire_timeout` on the concurrency
/// semaphore; stale idle connections are discarded rather than reused, and
/// returned connections are health-checked before being parked.
pub struct ConnectionPool {
    provider: Arc<dyn ToolProvider>,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection>>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a pool for `provider`.
    pub fn new(provider: Arc<dyn ToolProvider>, config: PoolConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            provider,
            config,
            slots,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn idle_lock(&self) -> std::sync::MutexGuard<'_, Vec<IdleConnection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check a connection out of the pool, reusing a parked one when
    /// possible and dialing the provider otherwise.
    pub async fn acquire(&self) -> Result<PooledConnection, ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolError::PoolExhausted);
        }

        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ToolError::PoolExhausted),
            Err(_) => {
                return Err(ToolError::AcquireTimeout(
                    self.config.acquire_timeout.as_millis() as u64,
                ));
            }
        };

        // Prefer a fresh-enough parked connection; stale ones are dropped.
        loop {
            let parked = self.idle_lock().pop();
            match parked {
                Some(idle) if idle.parked_at.elapsed() < self.config.max_idle_time => {
                    return Ok(PooledConnection {
                        conn: idle.conn,
                        _permit: permit,
                    });
                }
                Some(_) => continue,
                None => break,
            }
        }

        let conn = match tokio::time::timeout(self.config.connection_timeout, self.provider.connect())
            .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ToolError::Transient(format!(
                    "connecting to provider {} timed out after {}ms",
                    self.provider.id(),
                    self.config.connection_timeout.as_millis()
                )));
            }
        };

        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Return a connection. It is health-checked and parked for reuse;
    /// unhealthy connections are discarded.
    pub async fn release(&self, mut pooled: PooledConnection) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if pooled.conn.check().await {
            self.idle_lock().push(IdleConnection {
                conn: pooled.conn,
                parked_at: Instant::now(),
            });
        } else {
            tracing::debug!(provider = %self.provider.id(), "discarding unhealthy connection");
        }
        // The permit drops here, freeing the slot.
    }

    /// Close the pool: reject new acquisitions and drop parked connections.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.close();
        self.idle_lock().clear();
    }

    /// Parked connection count (for diagnostics and tests).
    pub fn idle_count(&self) -> usize {
        self.idle_lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDescriptor;
    use async_trait::async_trait;
    use axon_core::ProviderId;
    use std::sync::atomic::AtomicUsize;

    struct MockConnection {
        healthy: bool,
    }

    #[async_trait]
    impl ToolConnection for MockConnection {
        async fn invoke(
            &mut self,
            _tool: &str,
            _arguments: &ArgumentMap,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::Value::Null)
        }

        async fn check(&mut self) -> bool {
            self.healthy
        }
    }

    struct MockProvider {
        id: ProviderId,
        dialed: AtomicUsize,
        healthy_connections: bool,
    }

    impl MockProvider {
        fn new(healthy: bool) -> Self {
            Self {
                id: ProviderId::from("mock"),
                dialed: AtomicUsize::new(0),
                healthy_connections: healthy,
            }
        }
    }

    #[async_trait]
    impl ToolProvider for MockProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(vec![])
        }

        async fn connect(&self) -> Result<Box<dyn ToolConnection>, ToolError> {
            self.dialed.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                healthy: self.healthy_connections,
            }))
        }

        async fn ping(&self) -> Result<(), ToolError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let provider = Arc::new(MockProvider::new(true));
        let pool = ConnectionPool::new(Arc::clone(&provider) as _, PoolConfig::default());

        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
        assert_eq!(pool.idle_count(), 1);

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(provider.dialed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unhealthy_connection_is_discarded_on_release() {
        let provider = Arc::new(MockProvider::new(false));
        let pool = ConnectionPool::new(Arc::clone(&provider) as _, PoolConfig::default());

        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
        assert_eq!(pool.idle_count(), 0);

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(provider.dialed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquire_times_out_when_slots_are_held() {
        let provider = Arc::new(MockProvider::new(true));
        let pool = ConnectionPool::new(
            Arc::clone(&provider) as _,
            PoolConfig {
                max_connections: 1,
                acquire_timeout: Duration::from_millis(20),
                ..PoolConfig::default()
            },
        );

        let held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, ToolError::AcquireTimeout(_)));
        drop(held);

        let _conn = pool.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire() {
        let provider = Arc::new(MockProvider::new(true));
        let pool = ConnectionPool::new(Arc::clone(&provider) as _, PoolConfig::default());
        pool.close();
        assert!(matches!(
            pool.acquire().await.unwrap_err(),
            ToolError::PoolExhausted
        ));
    }

    #[tokio::test]
    async fn stale_idle_connections_are_not_reused() {
        let provider = Arc::new(MockProvider::new(true));
        let pool = ConnectionPool::new(
            Arc::clone(&provider) as _,
            PoolConfig {
                max_idle_time: Duration::from_millis(0),
                ..PoolConfig::default()
            },
        );

        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
        let _conn = pool.acquire().await.unwrap();
        assert_eq!(provider.dialed.load(Ordering::SeqCst), 2);
    }
}
