#![deny(missing_docs)]
//! # axon — umbrella crate
//!
//! Provides a single import surface for the axon workflow engine, plus a
//! `prelude` for the happy path. The engine's pieces live in focused
//! crates:
//!
//! | Crate | What it holds |
//! |-------|---------------|
//! | [`axon_core`] | Event/state model, handler + provider contracts |
//! | [`axon_hooks`] | Named lifecycle callback registry |
//! | [`axon_trace`] | In-memory and file trace backends |
//! | [`axon_tool`] | Tool bridge: discovery, pool, cache, retry, breaker |
//! | [`axon_orch`] | Route/collaborative/sequential/loop/mixed dispatch |
//! | [`axon_compose`] | Sequential/parallel/loop composite handlers |
//! | [`axon_runner`] | Queued execution driver and lifecycle |
//! | [`axon_config`] | Declarative TOML configuration (feature `config`) |

pub use axon_compose;
pub use axon_core;
pub use axon_hooks;
pub use axon_orch;
pub use axon_runner;
pub use axon_tool;
pub use axon_trace;

#[cfg(feature = "config")]
pub use axon_config;

/// Happy-path imports for composing axon systems.
pub mod prelude {
    pub use axon_core::{
        AgentHandler, AgentResult, Callback, CallbackArgs, DurationMs, Event, EventBuilder,
        ExecutionContext, HookPoint, ModelProvider, SessionStore, SharedState, TraceEntry,
        TraceEntryType, TraceLogger, callback_fn, handler_fn,
    };
    pub use axon_core::{AgentId, EventId, ProviderId, SessionId};

    pub use axon_hooks::CallbackRegistry;

    pub use axon_compose::{LoopHandler, ParallelHandler, ParallelStrategy, SequentialHandler};

    pub use axon_orch::{
        DispatchMode, ErrorStrategy, OrchError, OrchestrationConfig, Orchestrator,
        StateMergePolicy,
    };

    pub use axon_runner::{Runner, RunnerBuilder, RunnerError};

    pub use axon_tool::{
        ToolDescriptor, ToolError, ToolInvocation, ToolProvider, ToolRegistry,
        ToolRegistryConfig, ToolResult,
    };

    pub use axon_trace::{FileTraceLogger, MemoryTraceLogger};

    #[cfg(feature = "config")]
    pub use axon_config::Config;
}
