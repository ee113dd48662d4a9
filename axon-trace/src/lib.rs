#![deny(missing_docs)]
//! Trace log backends for axon.
//!
//! Two implementations of [`TraceLogger`](axon_core::TraceLogger):
//!
//! - [`MemoryTraceLogger`] — per-session vectors behind a lock, with an
//!   optional session cap (oldest session evicted when full).
//! - [`FileTraceLogger`] — one append-only `<session_id>.trace` file per
//!   session under a configured directory, line-delimited JSON, flushed on
//!   every log.

mod file;
mod memory;

pub use file::FileTraceLogger;
pub use memory::MemoryTraceLogger;
