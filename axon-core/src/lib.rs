//! # axon-core — data model and protocol traits for the axon workflow engine
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! | Piece | Types | What it does |
//! |-------|-------|-------------|
//! | Events | [`Event`] | Immutable messages submitted for dispatch |
//! | State | [`SharedState`] | Concurrent key/value state threaded through a dispatch |
//! | Handlers | [`AgentHandler`], [`AgentResult`] | What one agent does per event |
//! | Hooks | [`HookPoint`], [`Callback`], [`CallbackArgs`] | Lifecycle observation points |
//! | Tracing | [`TraceEntry`], [`TraceEntryType`] | Structured execution records |
//! | Providers | [`ModelProvider`] | Abstract LLM call/stream/embed contract |
//! | Sessions | [`SessionStore`] | Short-term per-conversation persistence contract |
//!
//! ## Design principle
//!
//! Every trait here is operation-defined, not mechanism-defined.
//! [`AgentHandler::handle`] means "process this event against this state" —
//! not "call a model" or "run a subprocess". Implementations are swappable.
//!
//! ## Dependency notes
//!
//! Payload and state values are `serde_json::Value`. JSON is the universal
//! interchange format for agentic systems and `serde_json::Value` is the
//! de facto dynamic value type in the Rust ecosystem; a bespoke sum type
//! would duplicate it without practical benefit.

#![deny(missing_docs)]

pub mod context;
pub mod duration;
pub mod error;
pub mod event;
pub mod handler;
pub mod hook;
pub mod id;
pub mod keys;
pub mod provider;
pub mod session;
pub mod state;
pub mod trace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use context::ExecutionContext;
pub use duration::DurationMs;
pub use error::{CallbackError, HandlerError, ProviderError, SessionError, TraceError};
pub use event::{Event, EventBuilder};
pub use handler::{AgentHandler, AgentResult, BoxFuture, handler_fn};
pub use hook::{Callback, CallbackArgs, HookPoint, callback_fn};
pub use id::{AgentId, EventId, ProviderId, SessionId};
pub use provider::{ModelProvider, ModelResponse, Prompt, PromptMessage, Role, StreamChunk};
pub use session::SessionStore;
pub use state::SharedState;
pub use trace::{TraceEntry, TraceEntryType, TraceLogger};
