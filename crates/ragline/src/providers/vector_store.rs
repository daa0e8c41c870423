//! Vector index trait for storing and searching embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ChunkId, EmbeddingRecord, Metadata};

/// A raw match reported by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    /// Stored key
    pub id: String,
    /// Similarity, higher is more similar
    pub score: f32,
    /// Stored metadata (empty unless requested)
    pub metadata: Metadata,
}

/// Index-level statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub vector_count: u64,
}

/// Trait for an external similarity-search index
///
/// Implementations:
/// - `InMemoryIndex`: process-local cosine search
/// - `PineconeIndex`: Pinecone data plane over REST
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records by id
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Nearest neighbours of `vector`, best first
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>>;

    /// Ids of every stored chunk belonging to `parent_id`
    async fn list_chunk_ids(&self, parent_id: &str) -> Result<Vec<ChunkId>>;

    /// Delete records by id; unknown ids are ignored
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Dimension and size of the index
    async fn describe(&self) -> Result<IndexStats>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
