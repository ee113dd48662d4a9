//! Typed ID wrappers for event, agent, session, and provider identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up agent IDs, session IDs, etc.
/// These are just strings underneath — no format requirement. The engine
/// doesn't care what your IDs look like, only that event IDs are unique
/// within a process run (see [`EventId::generate`]).
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(EventId, "Unique identifier for an event.");
typed_id!(AgentId, "Unique identifier for a registered agent handler.");
typed_id!(SessionId, "Correlation key grouping events of one conversation.");
typed_id!(ProviderId, "Unique identifier for a tool provider.");

impl EventId {
    /// Generate a fresh, globally unique event ID (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_event_ids_are_unique() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_round_trips() {
        let id = AgentId::new("planner");
        assert_eq!(id.to_string(), "planner");
        assert_eq!(id.as_str(), "planner");
    }
}
