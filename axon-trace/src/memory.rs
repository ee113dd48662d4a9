//! In-memory trace logger.

use async_trait::async_trait;
use axon_core::{SessionId, TraceEntry, TraceError, TraceLogger};
use std::collections::HashMap;
use tokio::sync::Mutex;

struct SessionLog {
    entries: Vec<TraceEntry>,
    // Monotonic tick of the last append, used for eviction ordering.
    last_append: u64,
}

struct MemoryInner {
    sessions: HashMap<String, SessionLog>,
    clock: u64,
}

/// In-memory trace logger backed by per-session vectors behind a mutex.
///
/// Unbounded by default. With [`with_session_cap`](Self::with_session_cap),
/// appending an entry for a new session beyond the cap evicts the session
/// whose most recent entry is oldest.
pub struct MemoryTraceLogger {
    inner: Mutex<MemoryInner>,
    session_cap: Option<usize>,
}

impl MemoryTraceLogger {
    /// Create an unbounded logger.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                sessions: HashMap::new(),
                clock: 0,
            }),
            session_cap: None,
        }
    }

    /// Bound the number of retained sessions.
    #[must_use]
    pub fn with_session_cap(mut self, cap: usize) -> Self {
        self.session_cap = Some(cap.max(1));
        self
    }

    /// Number of sessions currently retained.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }
}

impl Default for MemoryTraceLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TraceLogger for MemoryTraceLogger {
    async fn log(&self, entry: TraceEntry) -> Result<(), TraceError> {
        let mut inner = self.inner.lock().await;
        inner.clock += 1;
        let tick = inner.clock;
        let session = entry.session_id.as_str().to_string();

        let is_new = !inner.sessions.contains_key(&session);
        if is_new {
            if let Some(cap) = self.session_cap {
                while inner.sessions.len() >= cap {
                    let stalest = inner
                        .sessions
                        .iter()
                        .min_by_key(|(_, log)| log.last_append)
                        .map(|(k, _)| k.clone());
                    match stalest {
                        Some(key) => {
                            tracing::debug!(session = %key, "evicting stalest trace session");
                            inner.sessions.remove(&key);
                        }
                        None => break,
                    }
                }
            }
        }

        let log = inner.sessions.entry(session).or_insert_with(|| SessionLog {
            entries: Vec::new(),
            last_append: tick,
        });
        log.entries.push(entry);
        log.last_append = tick;
        Ok(())
    }

    async fn traces(&self, session_id: &SessionId) -> Result<Vec<TraceEntry>, TraceError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .get(session_id.as_str())
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::TraceEntryType;

    fn entry(session: &str, ty: TraceEntryType) -> TraceEntry {
        TraceEntry::new(ty, session)
    }

    #[tokio::test]
    async fn entries_come_back_in_insertion_order() {
        let logger = MemoryTraceLogger::new();
        logger
            .log(entry("s1", TraceEntryType::EventStart))
            .await
            .unwrap();
        logger
            .log(entry("s1", TraceEntryType::AgentStart))
            .await
            .unwrap();
        logger
            .log(entry("s2", TraceEntryType::EventStart))
            .await
            .unwrap();
        logger
            .log(entry("s1", TraceEntryType::EventEnd))
            .await
            .unwrap();

        let s1 = logger.traces(&SessionId::from("s1")).await.unwrap();
        let types: Vec<_> = s1.iter().map(|e| e.entry_type).collect();
        assert_eq!(
            types,
            vec![
                TraceEntryType::EventStart,
                TraceEntryType::AgentStart,
                TraceEntryType::EventEnd
            ]
        );
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let logger = MemoryTraceLogger::new();
        assert!(
            logger
                .traces(&SessionId::from("nope"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn cap_evicts_stalest_session() {
        let logger = MemoryTraceLogger::new().with_session_cap(2);
        logger
            .log(entry("old", TraceEntryType::EventStart))
            .await
            .unwrap();
        logger
            .log(entry("mid", TraceEntryType::EventStart))
            .await
            .unwrap();
        // Touch "old" so "mid" becomes the stalest.
        logger
            .log(entry("old", TraceEntryType::EventEnd))
            .await
            .unwrap();
        logger
            .log(entry("new", TraceEntryType::EventStart))
            .await
            .unwrap();

        assert_eq!(logger.session_count().await, 2);
        assert!(
            logger
                .traces(&SessionId::from("mid"))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(logger.traces(&SessionId::from("old")).await.unwrap().len(), 2);
        assert_eq!(logger.traces(&SessionId::from("new")).await.unwrap().len(), 1);
    }
}
