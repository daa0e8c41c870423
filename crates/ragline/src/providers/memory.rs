//! Process-local vector index using cosine similarity
//!
//! Suitable for development, tests and single-node deployments where the
//! corpus fits in memory. Contents are lost on restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{ChunkId, EmbeddingRecord, Metadata};

use super::vector_store::{IndexMatch, IndexStats, VectorIndex};

#[derive(Debug, Clone)]
struct StoredVector {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// In-memory index with a fixed dimension
#[derive(Debug)]
pub struct InMemoryIndex {
    dimension: usize,
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    /// Stored ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.vectors.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stored metadata for one id
    pub fn metadata(&self, id: &str) -> Option<Metadata> {
        self.vectors.read().get(id).map(|v| v.metadata.clone())
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        // Validate the whole batch before touching the map
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        let mut vectors = self.vectors.write();
        for record in records {
            vectors.insert(
                record.id.to_string(),
                StoredVector {
                    vector: record.vector.clone(),
                    metadata: record.metadata.clone(),
                },
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let vectors = self.vectors.read();
        let mut scored: Vec<IndexMatch> = vectors
            .iter()
            .map(|(id, stored)| IndexMatch {
                id: id.clone(),
                score: cosine_similarity(&stored.vector, vector),
                metadata: if include_metadata {
                    stored.metadata.clone()
                } else {
                    Metadata::new()
                },
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list_chunk_ids(&self, parent_id: &str) -> Result<Vec<ChunkId>> {
        let vectors = self.vectors.read();
        let mut ids: Vec<ChunkId> = vectors
            .keys()
            .filter_map(|key| ChunkId::parse(key))
            .filter(|id| id.parent_id() == parent_id)
            .collect();
        ids.sort_by_key(ChunkId::sequence);
        Ok(ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut vectors = self.vectors.write();
        for id in ids {
            vectors.remove(id);
        }
        Ok(())
    }

    async fn describe(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            dimension: self.dimension,
            vector_count: self.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(parent: &str, seq: u32, vector: Vec<f32>) -> EmbeddingRecord {
        let mut metadata = Metadata::new();
        metadata.insert("text".to_string(), format!("{} #{}", parent, seq));
        EmbeddingRecord {
            id: ChunkId::new(parent, seq),
            vector,
            metadata,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(&[
                record("a", 0, vec![1.0, 0.0]),
                record("a", 1, vec![0.7, 0.7]),
                record("b", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.1], 2, true).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a_chunk0");
        assert_eq!(matches[1].id, "a_chunk1");
        assert!(matches[0].score >= matches[1].score);
        assert_eq!(matches[0].metadata["text"], "a #0");

        let bare = index.query(&[1.0, 0.1], 1, false).await.unwrap();
        assert!(bare[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new(3);
        assert!(index.query(&[1.0, 0.0, 0.0], 5, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_checked_on_upsert() {
        let index = InMemoryIndex::new(3);
        let err = index.upsert(&[record("a", 0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_list_and_delete_by_parent() {
        let index = InMemoryIndex::new(1);
        index
            .upsert(&[
                record("doc", 0, vec![1.0]),
                record("doc", 1, vec![1.0]),
                record("doc2", 0, vec![1.0]),
            ])
            .await
            .unwrap();

        let ids = index.list_chunk_ids("doc").await.unwrap();
        assert_eq!(ids, vec![ChunkId::new("doc", 0), ChunkId::new("doc", 1)]);

        index.delete(&["doc_chunk1".to_string()]).await.unwrap();
        assert_eq!(index.ids(), vec!["doc2_chunk0", "doc_chunk0"]);
        assert_eq!(index.describe().await.unwrap().vector_count, 2);
    }
}
