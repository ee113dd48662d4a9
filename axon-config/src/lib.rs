#![deny(missing_docs)]
//! Declarative TOML configuration for axon.
//!
//! One document wires a whole engine: the LLM provider descriptor, the
//! orchestration mode, tool providers, the cache/pool/resilience knobs,
//! the runner, and the trace backend. Parsing is strict about shape and
//! lenient about omissions — every field has a default, so an empty
//! document is a valid (route-mode, in-memory) engine.
//!
//! ```toml
//! [provider]
//! kind = "openai"
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [orchestration]
//! mode = "sequential"
//! agent_order = ["plan", "act", "summarize"]
//! timeout_ms = 30000
//!
//! [[tools]]
//! name = "web"
//! transport = "stdio"
//! command = "web-tools-server"
//!
//! [cache]
//! default_ttl_ms = 300000
//! [cache.tool_ttls]
//! search = 60000
//!
//! [runner]
//! queue_size = 128
//! workers = 2
//!
//! [trace]
//! backend = "file"
//! path = "/var/log/axon"
//! ```
//!
//! The `stop_predicate` of loop mode is code, not data — set it on the
//! produced [`OrchestrationConfig`](axon_orch::OrchestrationConfig) after
//! conversion.

mod model;
mod validate;

pub use model::{
    CacheSection, CircuitBreakerSection, Config, GroupSection, OrchestrationSection,
    PoolSection, ProviderSection, RetrySection, RunnerSection, StateMergeKind,
    ToolProviderSection, ToolTransport, TraceBackend, TraceSection,
};
pub use validate::{ConfigIssue, ConfigSeverity};

use thiserror::Error;

/// Configuration loading errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be read from disk.
    #[error("read {path}: {source}")]
    Io {
        /// The path that failed.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML for this schema.
    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation found at least one error-severity issue.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Parse, then fail on any error-severity validation issue.
    pub fn load_validated(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Fail on any error-severity validation issue.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let issues = self.validate();
        let errors: Vec<String> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}
