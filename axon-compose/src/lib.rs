#![deny(missing_docs)]
//! Composite agent handlers for axon.
//!
//! Deterministic sub-flows packaged behind the one-method
//! [`AgentHandler`] boundary, so a pipeline, a fan-out, or a retry loop
//! can be registered with an orchestrator like any other handler:
//!
//! - [`SequentialHandler`] — thread state through sub-handlers in order.
//! - [`ParallelHandler`] — run sub-handlers concurrently on state clones
//!   and merge under a strategy, with an optional timeout.
//! - [`LoopHandler`] — repeat one sub-handler under a stop predicate and
//!   iteration cap.
//!
//! Composites may nest, but not cycle: every composite derives a child
//! [`ExecutionContext`] one level deeper, and the context's depth cap
//! (default 16) turns accidental self-reference into an error instead of
//! an unbounded dispatch.

mod loop_handler;
mod parallel;
mod sequential;

pub use loop_handler::{LoopHandler, LoopStopPredicate};
pub use parallel::{ParallelHandler, ParallelStrategy};
pub use sequential::SequentialHandler;
