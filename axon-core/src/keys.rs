//! Reserved metadata and state keys.
//!
//! These keys have engine-level meaning and must not be repurposed by
//! application handlers.

/// Event/state metadata key naming the target handler in route mode.
pub const ROUTE_TO: &str = "route_to";

/// Event/state metadata key correlating events of one conversation.
pub const SESSION_ID: &str = "session_id";

/// State key written by loop-mode dispatch with the iteration count.
pub const LOOP_ITERATIONS: &str = "loop_iterations";

/// State key written by collaborative dispatch recording per-handler errors.
pub const PER_AGENT_ERRORS: &str = "per_agent_errors";
