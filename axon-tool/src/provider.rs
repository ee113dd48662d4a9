//! The ToolProvider contract — how out-of-process tool sources plug in.
//!
//! A provider is an external process or endpoint that can list its tools
//! and execute them over some transport (pipe-based child process, local
//! TCP, long-lived socket, websocket). The transport is the implementor's
//! concern; the bridge only sees these two traits.

use crate::error::ToolError;
use crate::types::{ArgumentMap, ToolDescriptor};
use async_trait::async_trait;
use axon_core::ProviderId;

/// An external source of tools.
///
/// Implementations should keep `ping` cheap — the registry uses it for
/// health checks under a provider-configured timeout.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// This provider's stable identifier.
    fn id(&self) -> &ProviderId;

    /// List the tools this provider can execute.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    /// Open a live connection for invoking tools.
    async fn connect(&self) -> Result<Box<dyn ToolConnection>, ToolError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), ToolError>;
}

/// One live connection to a provider.
///
/// Connections are owned exclusively while checked out of the pool, so
/// methods take `&mut self`.
#[async_trait]
pub trait ToolConnection: Send {
    /// Execute a named tool with the given arguments.
    async fn invoke(
        &mut self,
        tool: &str,
        arguments: &ArgumentMap,
    ) -> Result<serde_json::Value, ToolError>;

    /// Cheap health probe, run when a connection is returned to the pool.
    /// Unhealthy connections are discarded rather than parked.
    async fn check(&mut self) -> bool;
}
