//! Pipeline facade wiring providers, ingestion, retrieval and generation
//!
//! ```rust,ignore
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .embedder(embedder)
//!     .index(index)
//!     .completion(llm)
//!     .build()
//!     .await?;
//!
//! pipeline.ingest_documents(docs).await;
//! let answer = pipeline.generate("what changed?", None).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::AnswerComposer;
use crate::ingestion::tokenizer::{self, Tokenizer};
use crate::ingestion::{ContentType, ExtractorRegistry, IngestionCoordinator, TokenChunker};
use crate::providers::deadline::bounded;
use crate::providers::{self, CompletionProvider, EmbeddingProvider, IndexStats, VectorIndex};
use crate::retrieval::Retriever;
use crate::types::{IngestResult, RagAnswer, RetrievedMatch, SourceDocument};

/// Availability of each external capability
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub embedding: bool,
    pub completion: bool,
    pub index: bool,
    pub vector_count: Option<u64>,
}

impl ProviderHealth {
    pub fn all_healthy(&self) -> bool {
        self.embedding && self.completion && self.index
    }
}

/// Ingestion, retrieval and generation over shared providers
///
/// Providers are constructed once and shared read-only by every request.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn CompletionProvider>,
    coordinator: IngestionCoordinator,
    retriever: Arc<Retriever>,
    composer: AnswerComposer,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Build providers from configuration and connect to the index
    pub async fn from_config(config: RagConfig) -> Result<Self> {
        let embedder = providers::build_embedder(&config)?;
        let index = providers::build_index(&config).await?;
        let llm = providers::build_completion(&config)?;

        Self::builder()
            .config(config)
            .embedder(embedder)
            .index(index)
            .completion(llm)
            .build()
            .await
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Chunk, embed and store documents; failures are reported per document
    pub async fn ingest_documents(&self, documents: Vec<SourceDocument>) -> IngestResult {
        self.coordinator.ingest_documents(documents).await
    }

    /// Extract text from a file and ingest it under its base name
    pub async fn ingest_file(&self, path: &Path, content_type: ContentType) -> IngestResult {
        self.coordinator.ingest_file(path, content_type).await
    }

    /// Top-k chunks for a query, best first
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedMatch>> {
        self.retriever.retrieve(query, top_k).await
    }

    /// Grounded answer for a query
    pub async fn generate(&self, query: &str, top_k: Option<usize>) -> Result<RagAnswer> {
        self.composer.generate(query, top_k).await
    }

    pub async fn index_stats(&self) -> Result<IndexStats> {
        bounded("index describe", self.config.timeouts.query(), self.index.describe()).await
    }

    /// Probe every provider; never fails
    pub async fn health(&self) -> ProviderHealth {
        let (embedding, completion, stats) = tokio::join!(
            self.embedder.health_check(),
            self.llm.health_check(),
            self.index_stats(),
        );
        ProviderHealth {
            embedding: embedding.unwrap_or(false),
            completion: completion.unwrap_or(false),
            index: stats.is_ok(),
            vector_count: stats.ok().map(|s| s.vector_count),
        }
    }
}

/// Builder for [`RagPipeline`]
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    llm: Option<Arc<dyn CompletionProvider>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    extractors: Option<ExtractorRegistry>,
}

impl RagPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn completion(mut self, llm: Arc<dyn CompletionProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Override the tokenizer named in the chunking config
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Replace the default text and PDF extractors
    pub fn extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Some(extractors);
        self
    }

    /// Validate configuration, check the index, and assemble the pipeline
    ///
    /// Fails with `ConfigurationError` on bad settings or a dimension
    /// mismatch between embedder and index. Errors describing the index,
    /// including `IndexNotFound`, propagate unchanged.
    pub async fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedder = self
            .embedder
            .ok_or_else(|| Error::Config("an embedding provider is required".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| Error::Config("a vector index is required".to_string()))?;
        let llm = self
            .llm
            .ok_or_else(|| Error::Config("a completion provider is required".to_string()))?;

        let tokenizer = match self.tokenizer {
            Some(tokenizer) => tokenizer,
            None => tokenizer::from_config(&config.chunking.tokenizer)?,
        };
        let chunker = TokenChunker::new(
            tokenizer,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        )?;

        let stats = bounded("index describe", config.timeouts.query(), index.describe()).await?;
        if stats.dimension != embedder.dimensions() {
            return Err(Error::Config(format!(
                "embedding model '{}' produces {} dimensions but index '{}' expects {}",
                embedder.name(),
                embedder.dimensions(),
                index.name(),
                stats.dimension
            )));
        }

        tracing::info!(
            "Pipeline ready: {} embeddings ({} dims), {} index ({} vectors), {} completions ({}), chunks of {} tokens with {} overlap",
            embedder.name(),
            embedder.dimensions(),
            index.name(),
            stats.vector_count,
            llm.name(),
            llm.model(),
            chunker.chunk_size(),
            chunker.overlap()
        );

        let extractors = self
            .extractors
            .unwrap_or_else(|| ExtractorRegistry::with_defaults(config.timeouts.extraction()));

        let coordinator = IngestionCoordinator::new(
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&index),
            extractors,
            &config.processing,
            config.timeouts.clone(),
        );
        let retriever = Arc::new(Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.retrieval.clone(),
            config.timeouts.clone(),
        ));
        let composer = AnswerComposer::new(
            Arc::clone(&retriever),
            Arc::clone(&llm),
            config.generation.max_context_chars,
            config.timeouts.completion(),
        );

        Ok(RagPipeline {
            config,
            embedder,
            index,
            llm,
            coordinator,
            retriever,
            composer,
        })
    }
}
