//! Tool descriptors, invocations, and results.

use axon_core::{DurationMs, ProviderId, SessionId};
use serde::{Deserialize, Serialize};

/// JSON object map alias used for tool arguments.
pub type ArgumentMap = serde_json::Map<String, serde_json::Value>;

/// A tool advertised by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name (unique across the registry; collisions are resolved
    /// first-registered-wins).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input arguments.
    pub input_schema: serde_json::Value,
    /// The provider advertising this tool.
    pub provider_id: ProviderId,
}

/// A request to invoke a tool by name.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// JSON arguments.
    pub arguments: ArgumentMap,
    /// Pin the invocation to a specific provider, overriding the
    /// registry's tool-to-provider index and load balancing.
    pub provider_hint: Option<ProviderId>,
    /// Skip the result cache for this invocation (both lookup and fill).
    pub bypass_cache: bool,
    /// Session to attribute `tool_start`/`tool_end` trace entries to.
    pub session_id: Option<SessionId>,
}

impl ToolInvocation {
    /// Invoke `tool_name` with no arguments.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: ArgumentMap::new(),
            provider_hint: None,
            bypass_cache: false,
            session_id: None,
        }
    }

    /// Add an argument.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }

    /// Pin to a provider.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<ProviderId>) -> Self {
        self.provider_hint = Some(provider.into());
        self
    }

    /// Skip the cache.
    #[must_use]
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Attribute trace entries to a session.
    #[must_use]
    pub fn session(mut self, session: impl Into<SessionId>) -> Self {
        self.session_id = Some(session.into());
        self
    }
}

/// The outcome of a tool invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The tool's output (object or string, provider-defined).
    pub output: serde_json::Value,
    /// Provider-reported soft error, if any.
    pub error: Option<String>,
    /// Wall-clock duration of the invocation (near-zero on cache hits).
    pub duration: DurationMs,
    /// Whether the result came from the cache without contacting a provider.
    pub was_cached: bool,
}

/// Deterministic cache key for an invocation.
///
/// Encoding: `tool_name`, a NUL separator, then the argument map rendered
/// as JSON with object keys sorted lexicographically at every nesting
/// level. Two argument maps that are equal as JSON values produce the same
/// key regardless of insertion order.
pub fn canonical_key(tool_name: &str, arguments: &ArgumentMap) -> String {
    let mut out = String::with_capacity(tool_name.len() + 32);
    out.push_str(tool_name);
    out.push('\0');
    canonical_object(arguments, &mut out);
    out
}

fn canonical_object(map: &ArgumentMap, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // serde_json string encoding handles escaping.
        out.push_str(&serde_json::Value::String((*key).clone()).to_string());
        out.push(':');
        canonical_value(&map[key.as_str()], out);
    }
    out.push('}');
}

fn canonical_value(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_value(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => canonical_object(map, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_insertion_order_independent() {
        let mut a = ArgumentMap::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!({"b": 2, "a": [1, {"z": 0, "q": 9}]}));

        let mut b = ArgumentMap::new();
        b.insert("y".into(), json!({"a": [1, {"q": 9, "z": 0}], "b": 2}));
        b.insert("x".into(), json!(1));

        assert_eq!(canonical_key("search", &a), canonical_key("search", &b));
    }

    #[test]
    fn key_distinguishes_tool_and_arguments() {
        let mut args = ArgumentMap::new();
        args.insert("q".into(), json!("rust"));
        let other = ArgumentMap::new();

        assert_ne!(canonical_key("search", &args), canonical_key("fetch", &args));
        assert_ne!(canonical_key("search", &args), canonical_key("search", &other));
    }

    #[test]
    fn invocation_builder() {
        let inv = ToolInvocation::new("search")
            .arg("q", json!("rust"))
            .provider("web")
            .bypass_cache()
            .session("s1");
        assert_eq!(inv.tool_name, "search");
        assert_eq!(inv.arguments.get("q"), Some(&json!("rust")));
        assert_eq!(inv.provider_hint.as_ref().map(|p| p.as_str()), Some("web"));
        assert!(inv.bypass_cache);
    }
}
