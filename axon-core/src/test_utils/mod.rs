//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations that prove the trait APIs are usable.

mod echo_handler;
mod memory_session_store;
mod recording_callback;
mod scripted_provider;

pub use echo_handler::{CountingHandler, EchoHandler, FailingHandler, SleepyHandler};
pub use memory_session_store::MemorySessionStore;
pub use recording_callback::RecordingCallback;
pub use scripted_provider::ScriptedProvider;
