#![deny(missing_docs)]
//! Dispatch policies for axon.
//!
//! The [`Orchestrator`] receives events (from the runner or a direct
//! caller) and dispatches them to registered handlers under a declarative
//! [`OrchestrationConfig`]:
//!
//! - **route** — one handler, chosen by the event's `route_to` metadata;
//! - **collaborative** — broadcast to every registered handler and merge;
//! - **sequential** — thread state through an explicit handler order;
//! - **loop** — repeat a handler (or sequential group) under a stop
//!   predicate and iteration cap;
//! - **mixed** — sequential groups, each collaborative or sequential
//!   internally.
//!
//! Hooks bracket every handler (`BeforeAgentRun`/`AfterAgentRun`, or
//! `AgentError` on hard failure) and the dispatch itself
//! (`BeforeOrchestration`/`AfterOrchestration`); `agent_start`/`agent_end`
//! trace entries are emitted when a trace logger is attached.

mod config;
mod error;
mod merge;
mod orchestrator;

pub use config::{
    AgentGroup, DispatchMode, ErrorStrategy, GroupMode, KeyMergePolicy, OrchestrationConfig,
    StateMergePolicy, StopPredicate,
};
pub use error::OrchError;
pub use orchestrator::{Orchestrator, session_of};
