//! Completion provider trait for answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for single-turn chat completion
///
/// Implementations:
/// - `OpenAiCompletion`: OpenAI chat completions
/// - `OllamaCompletion`: Local Ollama server
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Return the text of the first completion for a system instruction and user prompt
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
