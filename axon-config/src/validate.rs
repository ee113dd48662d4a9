//! Configuration validation.

use crate::model::{Config, StateMergeKind, ToolTransport, TraceBackend};
use axon_orch::DispatchMode;
use std::collections::HashSet;
use std::fmt;

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    /// The configuration cannot drive an engine.
    Error,
    /// Suspicious but usable.
    Warning,
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Severity.
    pub severity: ConfigSeverity,
    /// Dotted field path (e.g. `orchestration.agent_order`).
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn error(field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Error,
        field: field.to_string(),
        message: message.into(),
    }
}

fn warning(field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Warning,
        field: field.to_string(),
        message: message.into(),
    }
}

impl Config {
    /// Check the document for inconsistencies. Errors make the document
    /// unusable; warnings are advisory.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        match self.orchestration.mode {
            DispatchMode::Sequential if self.orchestration.agent_order.is_empty() => {
                issues.push(error(
                    "orchestration.agent_order",
                    "sequential mode requires a non-empty agent_order",
                ));
            }
            DispatchMode::Loop => {
                if self.orchestration.agent_order.is_empty() {
                    issues.push(error(
                        "orchestration.agent_order",
                        "loop mode requires a non-empty agent_order",
                    ));
                }
                if self.orchestration.max_iterations == 0 {
                    issues.push(warning(
                        "orchestration.max_iterations",
                        "loop mode with max_iterations = 0 never runs its handler",
                    ));
                }
            }
            DispatchMode::Mixed if self.orchestration.agent_groups.is_empty() => {
                issues.push(error(
                    "orchestration.agent_groups",
                    "mixed mode requires at least one agent group",
                ));
            }
            _ => {}
        }

        if !(0.0..=1.0).contains(&self.orchestration.failure_threshold) {
            issues.push(error(
                "orchestration.failure_threshold",
                "must be within 0.0..=1.0",
            ));
        }
        if self.orchestration.state_merge != StateMergeKind::ByKey
            && !self.orchestration.key_policies.is_empty()
        {
            issues.push(warning(
                "orchestration.key_policies",
                "key_policies are ignored unless state_merge = \"by_key\"",
            ));
        }

        let mut seen = HashSet::new();
        for (i, tool) in self.tools.iter().enumerate() {
            let field = format!("tools[{i}]");
            if tool.name.is_empty() {
                issues.push(error(&field, "provider name must not be empty"));
            }
            if !seen.insert(tool.name.clone()) {
                issues.push(error(&field, format!("duplicate provider name '{}'", tool.name)));
            }
            match tool.transport {
                ToolTransport::Stdio => {
                    if tool.command.is_none() {
                        issues.push(error(&field, "stdio transport requires a command"));
                    }
                    if tool.url.is_some() {
                        issues.push(warning(&field, "url is ignored for stdio transport"));
                    }
                }
                ToolTransport::Tcp | ToolTransport::Socket | ToolTransport::Websocket => {
                    if tool.url.is_none() {
                        issues.push(error(&field, "this transport requires a url"));
                    }
                }
            }
        }

        if self.runner.queue_size == 0 {
            issues.push(error("runner.queue_size", "queue_size must be at least 1"));
        }
        if self.runner.workers == 0 {
            issues.push(error("runner.workers", "workers must be at least 1"));
        }

        if self.trace.backend == TraceBackend::File && self.trace.path.is_none() {
            issues.push(error("trace.path", "file backend requires a path"));
        }
        if self.trace.backend == TraceBackend::Memory && self.trace.path.is_some() {
            issues.push(warning("trace.path", "path is ignored for the memory backend"));
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            issues.push(error("cache.capacity", "an enabled cache needs capacity ≥ 1"));
        }
        if self.pool.max_connections == 0 {
            issues.push(error("pool.max_connections", "must be at least 1"));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_valid() {
        let config = Config::from_toml_str("").unwrap();
        assert!(
            config
                .validate()
                .iter()
                .all(|i| i.severity != ConfigSeverity::Error)
        );
    }

    #[test]
    fn sequential_without_order_is_an_error() {
        let config = Config::from_toml_str("[orchestration]\nmode = \"sequential\"\n").unwrap();
        let issues = config.validate();
        assert!(issues.iter().any(|i| {
            i.severity == ConfigSeverity::Error && i.field == "orchestration.agent_order"
        }));
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn stdio_tool_without_command_is_an_error() {
        let config = Config::from_toml_str(
            "[[tools]]\nname = \"web\"\ntransport = \"stdio\"\n",
        )
        .unwrap();
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn duplicate_tool_names_are_an_error() {
        let config = Config::from_toml_str(
            r#"
[[tools]]
name = "web"
transport = "tcp"
url = "127.0.0.1:9000"

[[tools]]
name = "web"
transport = "tcp"
url = "127.0.0.1:9001"
"#,
        )
        .unwrap();
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn file_trace_requires_path() {
        let config = Config::from_toml_str("[trace]\nbackend = \"file\"\n").unwrap();
        assert!(config.ensure_valid().is_err());
    }
}
