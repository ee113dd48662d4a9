#![deny(missing_docs)]
//! Queued execution driver for axon.
//!
//! The [`Runner`] owns a bounded FIFO event queue and a small pool of
//! worker loops. Each worker pulls an event, fires
//! `BeforeEventHandling`/`AfterEventHandling` callbacks around an
//! [`Orchestrator`] dispatch, and emits `event_enqueued` / `event_start` /
//! `event_end` / `error` trace entries. Handler panics are caught at the
//! worker boundary and logged; the worker keeps serving.
//!
//! ```no_run
//! use axon_core::test_utils::EchoHandler;
//! use axon_orch::OrchestrationConfig;
//! use axon_runner::RunnerBuilder;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = RunnerBuilder::new()
//!     .orchestration(OrchestrationConfig::route())
//!     .queue_size(32)
//!     .build();
//! runner.register_agent("echo", Arc::new(EchoHandler))?;
//! runner.start()?;
//! runner
//!     .emit(
//!         axon_core::Event::builder()
//!             .payload("message", json!("hi"))
//!             .route_to("echo")
//!             .session("s1")
//!             .build(),
//!     )
//!     .await?;
//! runner.stop().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod runner;

pub use builder::RunnerBuilder;
pub use runner::{Runner, RunnerConfig, RunnerError};
