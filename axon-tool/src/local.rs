//! In-process tool provider.
//!
//! Not every tool lives in another process. [`LocalToolProvider`] serves
//! closure-backed tools through the same [`ToolProvider`] contract the
//! out-of-process transports use, so local capabilities get the same
//! caching, metrics, and callback bracketing (pooled "connections" to an
//! in-process provider are free handles).

use crate::error::ToolError;
use crate::provider::{ToolConnection, ToolProvider};
use crate::types::{ArgumentMap, ToolDescriptor};
use async_trait::async_trait;
use axon_core::{BoxFuture, ProviderId};
use std::collections::HashMap;
use std::sync::Arc;

type LocalToolFn =
    dyn for<'a> Fn(&'a ArgumentMap) -> BoxFuture<'a, Result<serde_json::Value, ToolError>>
        + Send
        + Sync;

/// One in-process tool: a descriptor plus the closure that executes it.
pub struct LocalTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    f: Arc<LocalToolFn>,
}

/// Create a local tool from a closure.
///
/// The closure must return a `Box::pin(async move { ... })` future.
///
/// # Example
///
/// ```
/// use axon_tool::local_tool;
/// use serde_json::json;
///
/// let upper = local_tool(
///     "upper",
///     "Uppercase the `text` argument",
///     json!({"type": "object", "properties": {"text": {"type": "string"}}}),
///     |args| {
///         let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
///         Box::pin(async move { Ok(json!({"text": text.to_uppercase()})) })
///     },
/// );
/// # let _ = upper;
/// ```
#[must_use]
pub fn local_tool<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    input_schema: serde_json::Value,
    f: F,
) -> LocalTool
where
    F: for<'a> Fn(&'a ArgumentMap) -> BoxFuture<'a, Result<serde_json::Value, ToolError>>
        + Send
        + Sync
        + 'static,
{
    LocalTool {
        name: name.into(),
        description: description.into(),
        input_schema,
        f: Arc::new(f),
    }
}

/// A [`ToolProvider`] serving in-process tools.
pub struct LocalToolProvider {
    id: ProviderId,
    tools: HashMap<String, LocalTool>,
}

impl LocalToolProvider {
    /// Create an empty provider with the given id.
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            tools: HashMap::new(),
        }
    }

    /// Add a tool. Overwrites any existing tool with the same name.
    #[must_use]
    pub fn with_tool(mut self, tool: LocalTool) -> Self {
        self.tools.insert(tool.name.clone(), tool);
        self
    }
}

struct LocalConnection {
    tools: HashMap<String, Arc<LocalToolFn>>,
}

#[async_trait]
impl ToolConnection for LocalConnection {
    async fn invoke(
        &mut self,
        tool: &str,
        arguments: &ArgumentMap,
    ) -> Result<serde_json::Value, ToolError> {
        let f = self
            .tools
            .get(tool)
            .ok_or_else(|| ToolError::NotFound(tool.to_string()))?;
        f(arguments).await
    }

    async fn check(&mut self) -> bool {
        true
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
                provider_id: self.id.clone(),
            })
            .collect())
    }

    async fn connect(&self) -> Result<Box<dyn ToolConnection>, ToolError> {
        Ok(Box::new(LocalConnection {
            tools: self
                .tools
                .iter()
                .map(|(name, tool)| (name.clone(), Arc::clone(&tool.f)))
                .collect(),
        }))
    }

    async fn ping(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolRegistry, ToolRegistryConfig};
    use crate::types::ToolInvocation;
    use axon_core::ExecutionContext;
    use serde_json::json;

    fn upper() -> LocalTool {
        local_tool(
            "upper",
            "Uppercase the text argument",
            json!({"type": "object"}),
            |args| {
                let text = args
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Box::pin(async move { Ok(json!({"text": text.to_uppercase()})) })
            },
        )
    }

    #[tokio::test]
    async fn local_tools_flow_through_the_registry() {
        let registry = ToolRegistry::new(ToolRegistryConfig::default());
        let provider = Arc::new(LocalToolProvider::new("builtin").with_tool(upper()));
        let discovered = registry.register_provider(provider).await.unwrap();
        assert_eq!(discovered.len(), 1);

        let ctx = ExecutionContext::new();
        let result = registry
            .execute(&ctx, ToolInvocation::new("upper").arg("text", json!("hi")))
            .await
            .unwrap();
        assert_eq!(result.output, json!({"text": "HI"}));
        assert!(!result.was_cached);

        // Local tools get the same cache as remote ones.
        let again = registry
            .execute(&ctx, ToolInvocation::new("upper").arg("text", json!("hi")))
            .await
            .unwrap();
        assert!(again.was_cached);
    }

    #[tokio::test]
    async fn unknown_local_tool_fails_cleanly() {
        let provider = LocalToolProvider::new("builtin").with_tool(upper());
        let mut conn = provider.connect().await.unwrap();
        let err = conn.invoke("missing", &ArgumentMap::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
