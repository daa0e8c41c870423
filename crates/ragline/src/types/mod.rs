//! Core types for the pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{
    Chunk, ChunkId, DocumentPayload, EmbeddingRecord, Metadata, SourceDocument, PARENT_ID_KEY,
    SEQUENCE_KEY, TEXT_KEY,
};
pub use query::QueryRequest;
pub use response::{FailedItem, IngestResult, RagAnswer, RetrievedMatch};
