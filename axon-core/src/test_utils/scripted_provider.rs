//! ScriptedProvider — returns canned responses in order.

use crate::context::ExecutionContext;
use crate::error::ProviderError;
use crate::provider::{ModelProvider, ModelResponse, Prompt, StreamChunk};
use async_trait::async_trait;
use std::sync::Mutex;

/// A model provider that replays a fixed script of responses.
///
/// `call` pops the next scripted response; once the script is exhausted it
/// returns `ProviderError::NonRetryable`. `stream` tokenizes the next
/// response by whitespace and terminates with [`StreamChunk::Done`].
/// `embeddings` returns a zero vector per input.
pub struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Create a provider replaying the given responses in order.
    pub fn new(responses: Vec<String>) -> Self {
        let mut script = responses;
        script.reverse();
        Self {
            responses: Mutex::new(script),
        }
    }

    fn next_response(&self) -> Result<String, ProviderError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::NonRetryable("script exhausted".into()))
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn call(
        &self,
        _ctx: &ExecutionContext,
        _prompt: Prompt,
    ) -> Result<ModelResponse, ProviderError> {
        let content = self.next_response()?;
        Ok(ModelResponse {
            content,
            model: "scripted".into(),
            tokens_in: 0,
            tokens_out: 0,
        })
    }

    async fn stream(
        &self,
        _ctx: &ExecutionContext,
        _prompt: Prompt,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamChunk>, ProviderError> {
        let content = self.next_response()?;
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for word in content.split_whitespace() {
                if tx.send(StreamChunk::Token(word.to_string())).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(StreamChunk::Done).await;
        });
        Ok(rx)
    }

    async fn embeddings(
        &self,
        _ctx: &ExecutionContext,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
    }
}
