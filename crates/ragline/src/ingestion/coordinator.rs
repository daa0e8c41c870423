//! Turns source documents and files into stored chunk embeddings

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use super::chunker::TokenChunker;
use super::extractor::{ContentType, ExtractorRegistry};
use crate::config::{ProcessingConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::providers::deadline::bounded;
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::{Chunk, EmbeddingRecord, IngestResult, Metadata, SourceDocument};

/// Chunk, embed and upsert documents, isolating failures per document
///
/// Documents within one batch run concurrently up to a configured limit;
/// chunks within one document are embedded sequentially and upserted as a
/// single batch.
pub struct IngestionCoordinator {
    chunker: TokenChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    extractors: ExtractorRegistry,
    timeouts: TimeoutConfig,
    max_concurrent_documents: usize,
    prune_stale_chunks: bool,
}

impl IngestionCoordinator {
    pub fn new(
        chunker: TokenChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        extractors: ExtractorRegistry,
        processing: &ProcessingConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            extractors,
            timeouts,
            max_concurrent_documents: processing.max_concurrent_documents.max(1),
            prune_stale_chunks: processing.prune_stale_chunks,
        }
    }

    /// Ingest a batch, reporting success or a classified failure per document
    ///
    /// Result lists keep the input order. Documents sharing an id run one
    /// after another in input order, so the last one wins.
    pub async fn ingest_documents(&self, documents: Vec<SourceDocument>) -> IngestResult {
        let total = documents.len();

        let mut groups: Vec<Vec<(usize, SourceDocument)>> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        for (position, doc) in documents.into_iter().enumerate() {
            match group_of.get(doc.id()) {
                Some(&group) => groups[group].push((position, doc)),
                None => {
                    group_of.insert(doc.id().to_string(), groups.len());
                    groups.push(vec![(position, doc)]);
                }
            }
        }

        let mut outcomes: Vec<(usize, IngestResult)> = stream::iter(groups)
            .map(|group| async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (position, doc) in group {
                    outcomes.push((position, self.ingest_one(&doc).await));
                }
                outcomes
            })
            .buffered(self.max_concurrent_documents)
            .flat_map(stream::iter)
            .collect()
            .await;
        outcomes.sort_by_key(|(position, _)| *position);

        let merged = outcomes
            .into_iter()
            .fold(IngestResult::default(), |mut acc, (_, r)| {
                acc.merge(r);
                acc
            });
        tracing::info!(
            "Ingested {}/{} documents ({} failed)",
            merged.succeeded.len(),
            total,
            merged.failed.len()
        );
        merged
    }

    async fn ingest_one(&self, doc: &SourceDocument) -> IngestResult {
        let id = doc.id().to_string();
        match self.ingest_document(doc).await {
            Ok(chunks) => {
                tracing::info!("Stored {} chunks for document '{}'", chunks, id);
                IngestResult::success(id)
            }
            Err(e) => {
                tracing::warn!("Failed to ingest document '{}': {}", id, e);
                IngestResult::failure(id, &e)
            }
        }
    }

    /// Extract, then ingest a single file
    ///
    /// The document id is the file's base name. An unsupported content type
    /// fails before the file is read or any provider is called.
    pub async fn ingest_file(&self, path: &Path, content_type: ContentType) -> IngestResult {
        let id = file_id(path);
        match self.load_file(path, &id, &content_type).await {
            Ok(doc) => self.ingest_documents(vec![doc]).await,
            Err(e) => {
                tracing::warn!("Failed to load '{}': {}", path.display(), e);
                IngestResult::failure(id, &e)
            }
        }
    }

    async fn load_file(
        &self,
        path: &Path,
        id: &str,
        content_type: &ContentType,
    ) -> Result<SourceDocument> {
        let extractor = self.extractors.get(content_type)?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::extraction(id, format!("failed to read file: {}", e)))?;
        let content_hash = hex::encode(Sha256::digest(&data));
        let extracted = extractor.extract(id, data).await?;

        let mut metadata: Metadata = extracted.metadata;
        metadata.insert("source".to_string(), path.display().to_string());
        metadata.insert("filename".to_string(), id.to_string());
        metadata.insert("content_type".to_string(), content_type.to_string());
        metadata.insert("content_hash".to_string(), content_hash);

        tracing::debug!(
            "Extracted {} bytes of text from '{}' with the {} extractor",
            extracted.text.len(),
            id,
            extractor.name()
        );
        SourceDocument::with_metadata(id, extracted.text, metadata)
    }

    /// Chunk, embed and upsert one document; returns the chunk count
    async fn ingest_document(&self, doc: &SourceDocument) -> Result<usize> {
        let texts = self.chunker.split(doc.text())?;
        let expected = self.embedder.dimensions();

        let mut records = Vec::with_capacity(texts.len());
        for (position, text) in texts.into_iter().enumerate() {
            let sequence = u32::try_from(position).map_err(|_| {
                Error::InvalidInput(format!("document '{}' has too many chunks", doc.id()))
            })?;
            let chunk = Chunk::from_parent(doc, sequence, text);

            let vector =
                bounded("embedding", self.timeouts.embed(), self.embedder.embed(&chunk.text)).await?;
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            records.push(EmbeddingRecord::from_chunk(chunk, vector));
        }

        if !records.is_empty() {
            bounded("upsert", self.timeouts.upsert(), self.index.upsert(&records)).await?;
        }

        if self.prune_stale_chunks {
            // Best effort; the new chunks are already stored
            if let Err(e) = self.prune_stale(doc.id(), records.len()).await {
                tracing::warn!("Could not prune stale chunks of '{}': {}", doc.id(), e);
            }
        }

        Ok(records.len())
    }

    /// Delete chunks of `parent_id` at or beyond `chunk_count`
    async fn prune_stale(&self, parent_id: &str, chunk_count: usize) -> Result<()> {
        let existing = bounded(
            "index list",
            self.timeouts.query(),
            self.index.list_chunk_ids(parent_id),
        )
        .await?;

        let stale: Vec<String> = existing
            .into_iter()
            .filter(|id| id.sequence() as usize >= chunk_count)
            .map(|id| id.to_string())
            .collect();
        if stale.is_empty() {
            return Ok(());
        }

        tracing::info!("Pruning {} stale chunks of '{}'", stale.len(), parent_id);
        bounded("index delete", self.timeouts.upsert(), self.index.delete(&stale)).await
    }
}

fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
