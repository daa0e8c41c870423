//! # ragline
//!
//! Document ingestion and retrieval pipeline:
//! - Token-window chunking with configurable size and overlap
//! - Embedding through Ollama or OpenAI
//! - Storage in Pinecone or an in-memory index
//! - Top-k retrieval and grounded answer generation
//! - Background ingestion of uploaded `.txt` and `.pdf` files

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, ErrorKind, Result};
pub use ingestion::ContentType;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use server::RagServer;
pub use types::{IngestResult, RagAnswer, RetrievedMatch, SourceDocument};
