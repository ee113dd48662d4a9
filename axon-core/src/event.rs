//! Immutable events — the messages that flow through the engine.

use crate::id::EventId;
use crate::keys;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An immutable message submitted to the runner for dispatch.
///
/// Construction deep-copies the payload and metadata maps; after that the
/// event exposes getters only. Emission and dispatch pass events by
/// reference — an event is never mutated, re-enqueued, or recycled.
///
/// # Reserved metadata keys
///
/// - [`keys::ROUTE_TO`] — target handler name for route-mode dispatch.
/// - [`keys::SESSION_ID`] — correlation key for trace grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    payload: HashMap<String, serde_json::Value>,
    metadata: HashMap<String, String>,
    source: Option<String>,
    target: Option<String>,
}

impl Event {
    /// Create an event with the given payload and metadata.
    ///
    /// A globally unique ID is generated; construction cannot fail.
    pub fn new(
        payload: HashMap<String, serde_json::Value>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            payload,
            metadata,
            source: None,
            target: None,
        }
    }

    /// Start building an event.
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    /// The event's unique ID.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// The application payload.
    pub fn payload(&self) -> &HashMap<String, serde_json::Value> {
        &self.payload
    }

    /// Look up a single payload value.
    pub fn payload_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }

    /// The routing/correlation metadata.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Look up a single metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The `route_to` metadata value, if present.
    pub fn route_to(&self) -> Option<&str> {
        self.meta(keys::ROUTE_TO)
    }

    /// The `session_id` metadata value, if present.
    pub fn session_id(&self) -> Option<&str> {
        self.meta(keys::SESSION_ID)
    }

    /// Optional source label.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Optional target label.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// Builder for [`Event`].
///
/// ```
/// use axon_core::Event;
/// use serde_json::json;
///
/// let event = Event::builder()
///     .payload("message", json!("hi"))
///     .meta("route_to", "echo")
///     .source("cli")
///     .build();
/// assert_eq!(event.route_to(), Some("echo"));
/// ```
#[derive(Debug, Default)]
pub struct EventBuilder {
    payload: HashMap<String, serde_json::Value>,
    metadata: HashMap<String, String>,
    source: Option<String>,
    target: Option<String>,
}

impl EventBuilder {
    /// Add a payload entry.
    #[must_use]
    pub fn payload(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the session correlation key.
    #[must_use]
    pub fn session(self, session_id: impl Into<String>) -> Self {
        self.meta(keys::SESSION_ID, session_id)
    }

    /// Set the route target.
    #[must_use]
    pub fn route_to(self, handler: impl Into<String>) -> Self {
        self.meta(keys::ROUTE_TO, handler)
    }

    /// Set the source label.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the target label.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Finish building; generates the event ID.
    pub fn build(self) -> Event {
        Event {
            id: EventId::generate(),
            payload: self.payload,
            metadata: self.metadata,
            source: self.source,
            target: self.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn construction_preserves_payload_and_metadata() {
        let mut payload = HashMap::new();
        payload.insert("message".to_string(), json!({"nested": [1, 2, 3]}));
        let mut metadata = HashMap::new();
        metadata.insert("session_id".to_string(), "s1".to_string());

        let event = Event::new(payload.clone(), metadata.clone());
        assert_eq!(event.payload(), &payload);
        assert_eq!(event.metadata(), &metadata);
        assert_eq!(event.session_id(), Some("s1"));
        assert_eq!(event.route_to(), None);
    }

    #[test]
    fn builder_sets_labels_and_reserved_keys() {
        let event = Event::builder()
            .payload("k", json!(1))
            .session("s9")
            .route_to("echo")
            .source("a")
            .target("b")
            .build();
        assert_eq!(event.session_id(), Some("s9"));
        assert_eq!(event.route_to(), Some("echo"));
        assert_eq!(event.source(), Some("a"));
        assert_eq!(event.target(), Some("b"));
    }

    #[test]
    fn every_event_gets_a_distinct_id() {
        let a = Event::builder().build();
        let b = Event::builder().build();
        assert_ne!(a.id(), b.id());
    }
}
