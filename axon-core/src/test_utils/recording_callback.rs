//! RecordingCallback — records every firing for inspection in tests.

use crate::context::ExecutionContext;
use crate::error::CallbackError;
use crate::hook::{Callback, CallbackArgs, HookPoint};
use crate::state::SharedState;
use async_trait::async_trait;
use std::sync::Mutex;

/// A recorded callback firing.
#[derive(Debug, Clone)]
pub struct RecordedFiring {
    /// The hook point that fired.
    pub point: HookPoint,
    /// The agent involved, if any.
    pub agent_id: Option<String>,
    /// The error message carried, if any.
    pub error_message: Option<String>,
}

/// A callback that records every firing and passes state through unchanged.
/// Use `.firings()` to inspect what was recorded.
#[derive(Default)]
pub struct RecordingCallback {
    firings: Mutex<Vec<RecordedFiring>>,
}

impl RecordingCallback {
    /// Create a new recording callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all recorded firings.
    pub fn firings(&self) -> Vec<RecordedFiring> {
        self.firings.lock().unwrap().clone()
    }
}

#[async_trait]
impl Callback for RecordingCallback {
    async fn invoke(
        &self,
        _ctx: &ExecutionContext,
        args: CallbackArgs,
    ) -> Result<SharedState, CallbackError> {
        self.firings.lock().unwrap().push(RecordedFiring {
            point: args.point,
            agent_id: args.agent_id.as_ref().map(|a| a.as_str().to_string()),
            error_message: args.error_message.clone(),
        });
        Ok(args.state)
    }
}
