//! Provider abstractions for embeddings, vector indexes and completions
//!
//! The pipeline depends only on the traits here; concrete backends are
//! selected from configuration by the `build_*` functions below.

pub mod deadline;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod openai;
pub mod pinecone;
pub mod vector_store;

mod http;

pub use embedding::EmbeddingProvider;
pub use llm::CompletionProvider;
pub use memory::InMemoryIndex;
pub use ollama::{OllamaCompletion, OllamaEmbedder};
pub use openai::{OpenAiCompletion, OpenAiEmbedder};
pub use pinecone::PineconeIndex;
pub use vector_store::{IndexMatch, IndexStats, VectorIndex};

use std::sync::Arc;

use crate::config::{EmbeddingBackend, IndexBackend, LlmBackend, RagConfig};
use crate::error::Result;

/// Construct the embedding provider named by configuration
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let timeout = config.timeouts.longest();
    Ok(match config.embeddings.provider {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(&config.embeddings, timeout)?),
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(&config.embeddings, timeout)?),
    })
}

/// Construct the vector index named by configuration
///
/// Remote indexes are resolved here, so a missing index fails with
/// `IndexNotFound` before anything is served.
pub async fn build_index(config: &RagConfig) -> Result<Arc<dyn VectorIndex>> {
    Ok(match config.index.backend {
        IndexBackend::Memory => Arc::new(InMemoryIndex::new(config.embeddings.dimensions)),
        IndexBackend::Pinecone => {
            Arc::new(PineconeIndex::connect(&config.index, config.timeouts.longest()).await?)
        }
    })
}

/// Construct the completion provider named by configuration
pub fn build_completion(config: &RagConfig) -> Result<Arc<dyn CompletionProvider>> {
    let timeout = config.timeouts.completion();
    Ok(match config.llm.provider {
        LlmBackend::Ollama => Arc::new(OllamaCompletion::new(&config.llm, timeout)?),
        LlmBackend::OpenAi => Arc::new(OpenAiCompletion::new(&config.llm, timeout)?),
    })
}
