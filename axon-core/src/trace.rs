//! Structured execution trace records and the logger contract.

use crate::duration::DurationMs;
use crate::error::TraceError;
use crate::hook::HookPoint;
use crate::id::{AgentId, EventId, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of step a trace entry records.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEntryType {
    /// An event was accepted into the runner queue.
    EventEnqueued,
    /// A worker began dispatching an event.
    EventStart,
    /// Dispatch of an event finished.
    EventEnd,
    /// A handler invocation began.
    AgentStart,
    /// A handler invocation finished.
    AgentEnd,
    /// A tool invocation began.
    ToolStart,
    /// A tool invocation finished.
    ToolEnd,
    /// A dispatch-level error (handler failure, panic, timeout).
    Error,
    /// A callback fired — or failed (see `error_message`).
    Callback,
}

/// Compact summary of an [`AgentResult`](crate::AgentResult) carried in a
/// trace entry; the full output state rides in `state_snapshot` when
/// snapshotting is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Whether the handler reported success.
    pub success: bool,
    /// The handler's recoverable error message, if any.
    pub error_message: Option<String>,
    /// Invocation duration.
    pub duration: DurationMs,
}

/// One record in the execution trace.
///
/// Entries with the same `session_id` form an append-only, causally
/// consistent sequence: timestamps are non-decreasing, ties broken by
/// insertion order.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// When the step happened.
    pub timestamp: DateTime<Utc>,
    /// What kind of step this is.
    #[serde(rename = "type")]
    pub entry_type: TraceEntryType,
    /// Session the step belongs to.
    pub session_id: SessionId,
    /// Event being dispatched, if any.
    pub event_id: Option<EventId>,
    /// Handler involved, if any.
    pub agent_id: Option<AgentId>,
    /// Hook point, for `callback` entries.
    pub hook: Option<HookPoint>,
    /// Source label from the event.
    pub source: Option<String>,
    /// Target label from the event.
    pub target: Option<String>,
    /// Optional JSON snapshot of the working state.
    pub state_snapshot: Option<serde_json::Value>,
    /// Optional handler result summary.
    pub agent_result: Option<ResultSummary>,
    /// Error message, for `error` and failed `callback` entries.
    pub error_message: Option<String>,
}

impl TraceEntry {
    /// Create an entry stamped "now" with only type and session set.
    pub fn new(entry_type: TraceEntryType, session_id: impl Into<SessionId>) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type,
            session_id: session_id.into(),
            event_id: None,
            agent_id: None,
            hook: None,
            source: None,
            target: None,
            state_snapshot: None,
            agent_result: None,
            error_message: None,
        }
    }

    /// Attach the event id.
    #[must_use]
    pub fn with_event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Attach the agent id.
    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Attach the hook point.
    #[must_use]
    pub fn with_hook(mut self, hook: HookPoint) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Attach source/target labels.
    #[must_use]
    pub fn with_labels(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source = source;
        self.target = target;
        self
    }

    /// Attach a state snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.state_snapshot = Some(snapshot);
        self
    }

    /// Attach a handler result summary.
    #[must_use]
    pub fn with_result(mut self, summary: ResultSummary) -> Self {
        self.agent_result = Some(summary);
        self
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Append-only, session-queryable execution trace log.
///
/// Implementations serialize concurrent `log` calls internally; entries
/// for one session come back from `traces` in insertion order. Entries are
/// never mutated or deleted once appended (a bounded backend may evict
/// whole sessions by age).
#[async_trait]
pub trait TraceLogger: Send + Sync {
    /// Append one entry.
    async fn log(&self, entry: TraceEntry) -> Result<(), TraceError>;

    /// All entries for a session, in insertion order. Unknown sessions
    /// yield an empty sequence.
    async fn traces(&self, session_id: &SessionId) -> Result<Vec<TraceEntry>, TraceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_serializes_as_spec_strings() {
        for (ty, s) in [
            (TraceEntryType::EventEnqueued, "event_enqueued"),
            (TraceEntryType::EventStart, "event_start"),
            (TraceEntryType::EventEnd, "event_end"),
            (TraceEntryType::AgentStart, "agent_start"),
            (TraceEntryType::AgentEnd, "agent_end"),
            (TraceEntryType::ToolStart, "tool_start"),
            (TraceEntryType::ToolEnd, "tool_end"),
            (TraceEntryType::Error, "error"),
            (TraceEntryType::Callback, "callback"),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), format!("\"{s}\""));
        }
    }

    #[test]
    fn entry_round_trips_through_json() {
        let entry = TraceEntry::new(TraceEntryType::AgentStart, "s1")
            .with_event(EventId::new("e1"))
            .with_agent(AgentId::new("echo"))
            .with_error("boom");
        let line = serde_json::to_string(&entry).unwrap();
        let back: TraceEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back.entry_type, TraceEntryType::AgentStart);
        assert_eq!(back.session_id.as_str(), "s1");
        assert_eq!(back.agent_id.as_ref().map(|a| a.as_str()), Some("echo"));
        assert_eq!(back.error_message.as_deref(), Some("boom"));
    }
}
