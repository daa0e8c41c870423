//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (all-minilm, nomic-embed-text)
/// - `OpenAiEmbedder`: OpenAI embeddings API
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimensionality (384 for all-MiniLM-L6-v2)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
