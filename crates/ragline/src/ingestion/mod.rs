//! Document ingestion: extraction, chunking and storage

pub mod chunker;
pub mod coordinator;
pub mod extractor;
pub mod tokenizer;

pub use chunker::TokenChunker;
pub use coordinator::IngestionCoordinator;
pub use extractor::{
    ContentType, ExtractedText, ExtractorRegistry, PdfExtractor, PlainTextExtractor, TextExtractor,
};
pub use tokenizer::{HfTokenizer, TokenSpan, Tokenizer, WordTokenizer};
