//! Source documents, chunks and the records written to the vector index

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// String metadata attached to documents, chunks and index records
pub type Metadata = HashMap<String, String>;

/// Metadata key holding the chunk text in the index
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the parent document id
pub const PARENT_ID_KEY: &str = "parent_id";
/// Metadata key holding the chunk sequence number
pub const SEQUENCE_KEY: &str = "sequence";

/// A document to be ingested
///
/// Built through [`SourceDocument::new`] or deserialized from a
/// [`DocumentPayload`], both of which validate the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentPayload")]
pub struct SourceDocument {
    id: String,
    text: String,
    metadata: Metadata,
}

impl SourceDocument {
    /// Create a document with no metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::with_metadata(id, text, Metadata::new())
    }

    /// Create a document with caller metadata
    pub fn with_metadata(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Self> {
        let id = id.into();
        validate_document_id(&id)?;
        Ok(Self {
            id,
            text: text.into(),
            metadata,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Untrusted document shape accepted at the transport boundary
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentPayload {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl TryFrom<DocumentPayload> for SourceDocument {
    type Error = Error;

    fn try_from(payload: DocumentPayload) -> Result<Self> {
        SourceDocument::with_metadata(payload.id, payload.text, payload.metadata)
    }
}

fn validate_document_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput("document id must not be empty".to_string()));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::InvalidInput(format!(
            "document id {:?} contains control characters",
            id
        )));
    }
    Ok(())
}

/// Composite index key `"{parent_id}_chunk{sequence}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    parent_id: String,
    sequence: u32,
}

impl ChunkId {
    const SEPARATOR: &'static str = "_chunk";

    pub fn new(parent_id: impl Into<String>, sequence: u32) -> Self {
        Self {
            parent_id: parent_id.into(),
            sequence,
        }
    }

    /// Key prefix shared by every chunk of a parent
    pub fn prefix(parent_id: &str) -> String {
        format!("{}{}", parent_id, Self::SEPARATOR)
    }

    /// Parse a stored key back into its parts
    ///
    /// Splits on the last separator, so parent ids that themselves contain
    /// `_chunk` still round-trip.
    pub fn parse(key: &str) -> Option<Self> {
        let split = key.rfind(Self::SEPARATOR)?;
        let (parent_id, rest) = key.split_at(split);
        let digits = &rest[Self::SEPARATOR.len()..];
        if parent_id.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let sequence = digits.parse().ok()?;
        Some(Self::new(parent_id, sequence))
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.parent_id, Self::SEPARATOR, self.sequence)
    }
}

/// A bounded token window of a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document id
    pub parent_id: String,
    /// Position within the parent, contiguous from 0
    pub sequence: u32,
    /// Chunk text (never empty)
    pub text: String,
    /// Parent metadata plus `parent_id` and `sequence`
    pub metadata: Metadata,
}

impl Chunk {
    /// Derive a chunk from its parent document
    pub fn from_parent(doc: &SourceDocument, sequence: u32, text: String) -> Self {
        let mut metadata = doc.metadata().clone();
        metadata.insert(PARENT_ID_KEY.to_string(), doc.id().to_string());
        metadata.insert(SEQUENCE_KEY.to_string(), sequence.to_string());
        Self {
            parent_id: doc.id().to_string(),
            sequence,
            text,
            metadata,
        }
    }

    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.parent_id.clone(), self.sequence)
    }
}

/// A chunk embedding as written to the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    /// Chunk metadata; always contains `text`
    pub metadata: Metadata,
}

impl EmbeddingRecord {
    /// Pair a chunk with its embedding
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        let id = chunk.id();
        let mut metadata = chunk.metadata;
        metadata.insert(TEXT_KEY.to_string(), chunk.text);
        Self { id, vector, metadata }
    }

    pub fn text(&self) -> &str {
        self.metadata.get(TEXT_KEY).map(String::as_str).unwrap_or_default()
    }
}
