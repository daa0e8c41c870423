//! Embeds a query and ranks stored chunks against it

use std::sync::Arc;

use crate::config::{RetrievalConfig, TimeoutConfig};
use crate::error::{Error, Result};
use crate::providers::deadline::bounded;
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::{RetrievedMatch, TEXT_KEY};

/// Top-k retrieval over the vector index
///
/// The embedder must be the one used at ingestion; vectors from a
/// different model are not comparable.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
    timeouts: TimeoutConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
            timeouts,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.config.default_top_k
    }

    /// Return up to `top_k` matches, best first
    ///
    /// An empty index yields an empty list. Matches stored without text are
    /// skipped.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedMatch>> {
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be greater than zero".to_string()));
        }
        let top_k = if top_k > self.config.max_top_k {
            tracing::debug!("Clamping top_k {} to {}", top_k, self.config.max_top_k);
            self.config.max_top_k
        } else {
            top_k
        };

        let vector = bounded("embedding", self.timeouts.embed(), self.embedder.embed(query)).await?;
        let raw = bounded(
            "index query",
            self.timeouts.query(),
            self.index.query(&vector, top_k, true),
        )
        .await?;

        let found = raw.len();
        let matches: Vec<RetrievedMatch> = raw
            .into_iter()
            .filter(|m| self.config.min_score.map_or(true, |min| m.score >= min))
            .filter_map(|mut m| {
                let Some(text) = m.metadata.remove(TEXT_KEY) else {
                    tracing::debug!("Skipping match '{}' without stored text", m.id);
                    return None;
                };
                Some(RetrievedMatch {
                    id: m.id,
                    text,
                    metadata: m.metadata,
                    score: m.score,
                })
            })
            .take(top_k)
            .collect();

        tracing::debug!(
            "Retrieved {} of {} matches for query ({} chars)",
            matches.len(),
            found,
            query.len()
        );
        Ok(matches)
    }
}
