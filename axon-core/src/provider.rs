//! The ModelProvider contract — abstract LLM call/stream/embed interface.
//!
//! The engine never speaks any particular LLM API; concrete SDK adapters
//! are external collaborators implementing this trait.

use crate::context::ExecutionContext;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The role of a prompt message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A system instruction.
    System,
    /// A human user.
    User,
    /// The model.
    Assistant,
}

/// One message of a prompt conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// The author role.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl PromptMessage {
    /// A user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// A request to a language model.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prompt {
    /// Optional model override (provider-specific string).
    pub model: Option<String>,
    /// Optional system prompt.
    pub system: Option<String>,
    /// The conversation messages.
    pub messages: Vec<PromptMessage>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl Prompt {
    /// A single-turn user prompt.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            messages: vec![PromptMessage::user(text)],
            ..Self::default()
        }
    }
}

/// A completed model response.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated text.
    pub content: String,
    /// The model that produced it.
    pub model: String,
    /// Input tokens consumed (zero if the provider can't report it).
    pub tokens_in: u64,
    /// Output tokens generated (zero if the provider can't report it).
    pub tokens_out: u64,
}

/// One chunk of a streamed response.
///
/// The stream is finite and not restartable: it yields zero or more
/// `Token` chunks and terminates with exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A content fragment.
    Token(String),
    /// End marker: generation completed normally.
    Done,
    /// Terminal error: generation failed mid-stream.
    Error(String),
}

/// Abstract LLM interface used by handlers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name, for logging and configuration.
    fn name(&self) -> &str;

    /// One-shot completion.
    async fn call(
        &self,
        ctx: &ExecutionContext,
        prompt: Prompt,
    ) -> Result<ModelResponse, ProviderError>;

    /// Streamed completion. The receiver yields [`StreamChunk`]s and the
    /// channel closes after the terminal chunk.
    async fn stream(
        &self,
        ctx: &ExecutionContext,
        prompt: Prompt,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamChunk>, ProviderError>;

    /// Embed a batch of texts, one vector per input.
    async fn embeddings(
        &self,
        ctx: &ExecutionContext,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, ProviderError>;
}
