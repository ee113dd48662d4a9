//! File-backed trace logger.

use async_trait::async_trait;
use axon_core::{SessionId, TraceEntry, TraceError, TraceLogger};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File-backed trace logger.
///
/// Each session appends to `<dir>/<session_id>.trace`, one JSON-encoded
/// entry per line, flushed on every log so a crash loses at most the entry
/// being written. `traces` re-reads and parses the file; lines that fail to
/// parse are skipped with a warning rather than poisoning the whole trace.
///
/// Session ids are percent-encoded into filenames so arbitrary correlation
/// keys can't escape the trace directory.
pub struct FileTraceLogger {
    dir: PathBuf,
    // Serializes appends; one logical writer as the trace contract requires.
    write_lock: Mutex<()>,
}

impl FileTraceLogger {
    /// Create a logger writing under `dir`. The directory is created
    /// lazily on first log.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The trace file path for a session.
    pub fn session_path(&self, session_id: &SessionId) -> PathBuf {
        self.dir
            .join(format!("{}.trace", encode_session(session_id.as_str())))
    }
}

/// Encode a session id into a filesystem-safe file stem.
fn encode_session(id: &str) -> String {
    let mut encoded = String::new();
    for ch in id.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    encoded
}

#[async_trait]
impl TraceLogger for FileTraceLogger {
    async fn log(&self, entry: TraceEntry) -> Result<(), TraceError> {
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| TraceError::LogFailed(format!("encode: {e}")))?;
        line.push('\n');

        let path = self.session_path(&entry.session_id);
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TraceError::LogFailed(format!("create {}: {e}", self.dir.display())))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TraceError::LogFailed(format!("open {}: {e}", path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TraceError::LogFailed(format!("append {}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| TraceError::LogFailed(format!("flush {}: {e}", path.display())))?;
        Ok(())
    }

    async fn traces(&self, session_id: &SessionId) -> Result<Vec<TraceEntry>, TraceError> {
        let path = self.session_path(session_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TraceError::ReadFailed(format!(
                    "read {}: {e}",
                    path.display()
                )));
            }
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping unparseable trace line"
                    );
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::{AgentId, TraceEntryType};

    fn entry(session: &str, ty: TraceEntryType) -> TraceEntry {
        TraceEntry::new(ty, session).with_agent(AgentId::new("echo"))
    }

    #[tokio::test]
    async fn log_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileTraceLogger::new(dir.path());

        logger
            .log(entry("s1", TraceEntryType::EventStart))
            .await
            .unwrap();
        logger
            .log(entry("s1", TraceEntryType::EventEnd))
            .await
            .unwrap();

        let entries = logger.traces(&SessionId::from("s1")).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, TraceEntryType::EventStart);
        assert_eq!(entries[1].entry_type, TraceEntryType::EventEnd);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[tokio::test]
    async fn sessions_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileTraceLogger::new(dir.path());

        logger
            .log(entry("a", TraceEntryType::EventStart))
            .await
            .unwrap();
        logger
            .log(entry("b", TraceEntryType::EventStart))
            .await
            .unwrap();

        assert!(logger.session_path(&SessionId::from("a")).exists());
        assert!(logger.session_path(&SessionId::from("b")).exists());
        assert_eq!(logger.traces(&SessionId::from("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileTraceLogger::new(dir.path());
        assert!(
            logger
                .traces(&SessionId::from("missing"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileTraceLogger::new(dir.path());
        logger
            .log(entry("s1", TraceEntryType::EventStart))
            .await
            .unwrap();

        let path = logger.session_path(&SessionId::from("s1"));
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n");
        std::fs::write(&path, content).unwrap();
        logger
            .log(entry("s1", TraceEntryType::EventEnd))
            .await
            .unwrap();

        let entries = logger.traces(&SessionId::from("s1")).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn weird_session_ids_stay_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileTraceLogger::new(dir.path());
        logger
            .log(entry("../escape/attempt", TraceEntryType::EventStart))
            .await
            .unwrap();

        let path = logger.session_path(&SessionId::from("../escape/attempt"));
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }
}
