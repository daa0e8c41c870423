//! Sliding token-window chunking

use std::ops::Range;
use std::sync::Arc;

use super::tokenizer::{TokenSpan, Tokenizer};
use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Splits text into overlapping windows of at most `chunk_size` tokens
///
/// Adjacent windows share exactly `overlap` tokens; the last window may be
/// shorter. Parameters are checked once at construction.
#[derive(Clone)]
pub struct TokenChunker {
    tokenizer: Arc<dyn Tokenizer>,
    chunk_size: usize,
    overlap: usize,
}

impl std::fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChunker")
            .field("tokenizer", &self.tokenizer.name())
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish()
    }
}

impl TokenChunker {
    /// Create a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`
    pub fn new(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            tokenizer,
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let tokenizer = super::tokenizer::from_config(&config.tokenizer)?;
        Self::new(tokenizer, config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Token index ranges of each window over `token_count` tokens
    pub fn windows(&self, token_count: usize) -> Vec<Range<usize>> {
        let stride = self.chunk_size - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        while start < token_count {
            let end = (start + self.chunk_size).min(token_count);
            windows.push(start..end);
            if end == token_count {
                break;
            }
            start += stride;
        }

        windows
    }

    /// Split text into chunk strings in source order
    ///
    /// Each chunk is the source slice from its first token to its last, so
    /// original spacing inside a window is preserved.
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        let spans = self.tokenizer.tokenize(text)?;
        Ok(self
            .windows(spans.len())
            .into_iter()
            .map(|window| slice(text, &spans[window]).to_string())
            .collect())
    }

    /// Token spans of `text`, as the chunker sees them
    pub fn tokens(&self, text: &str) -> Result<Vec<TokenSpan>> {
        self.tokenizer.tokenize(text)
    }
}

fn slice<'a>(text: &'a str, spans: &[TokenSpan]) -> &'a str {
    match (spans.first(), spans.last()) {
        (Some(first), Some(last)) => &text[first.start..last.end],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::tokenizer::WordTokenizer;

    fn chunker(size: usize, overlap: usize) -> TokenChunker {
        TokenChunker::new(Arc::new(WordTokenizer), size, overlap).unwrap()
    }

    #[test]
    fn test_window_example() {
        let chunks = chunker(3, 1).split("A B C D E F").unwrap();
        assert_eq!(chunks, vec!["A B C", "C D E", "E F"]);
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(chunker(3, 1).split("").unwrap().is_empty());
        assert!(chunker(3, 1).split("   \n\t").unwrap().is_empty());
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let chunks = chunker(256, 50).split("just a short note").unwrap();
        assert_eq!(chunks, vec!["just a short note"]);
    }

    #[test]
    fn test_exact_fit_has_no_trailing_window() {
        let chunks = chunker(3, 1).split("A B C").unwrap();
        assert_eq!(chunks, vec!["A B C"]);

        let chunks = chunker(3, 1).split("A B C D E").unwrap();
        assert_eq!(chunks, vec!["A B C", "C D E"]);
    }

    #[test]
    fn test_zero_overlap() {
        let chunks = chunker(2, 0).split("A B C D E").unwrap();
        assert_eq!(chunks, vec!["A B", "C D", "E"]);
    }

    #[test]
    fn test_windows() {
        assert_eq!(chunker(3, 1).windows(6), vec![0..3, 2..5, 4..6]);
        assert!(chunker(3, 1).windows(0).is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer);
        assert!(matches!(
            TokenChunker::new(tokenizer.clone(), 3, 3),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TokenChunker::new(tokenizer.clone(), 3, 5),
            Err(Error::Config(_))
        ));
        assert!(matches!(TokenChunker::new(tokenizer, 0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_internal_spacing_preserved() {
        let chunks = chunker(2, 0).split("alpha  beta\ngamma").unwrap();
        assert_eq!(chunks, vec!["alpha  beta", "gamma"]);
    }
}
