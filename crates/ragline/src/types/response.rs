//! Results returned by ingestion, retrieval and generation

use serde::{Deserialize, Serialize};

use super::document::Metadata;
use crate::error::{Error, ErrorKind};

/// A ranked chunk returned by the retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMatch {
    /// Index key of the chunk
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Stored metadata without the text field
    pub metadata: Metadata,
    /// Similarity, higher is more relevant
    pub score: f32,
}

/// A generated answer with the context it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub query: String,
    /// Retrieved texts in ranked order, as given to the model
    pub context: Vec<String>,
    pub answer: String,
}

/// A document that could not be ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: String,
    pub reason: ErrorKind,
    pub message: String,
}

impl FailedItem {
    pub fn from_error(id: impl Into<String>, error: &Error) -> Self {
        Self {
            id: id.into(),
            reason: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Per-item outcome of an ingestion call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedItem>,
}

impl IngestResult {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            succeeded: vec![id.into()],
            failed: Vec::new(),
        }
    }

    pub fn failure(id: impl Into<String>, error: &Error) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: vec![FailedItem::from_error(id, error)],
        }
    }

    /// Fold another result into this one, keeping order
    pub fn merge(&mut self, other: IngestResult) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
