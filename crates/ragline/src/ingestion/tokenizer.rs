//! Tokenizers used to measure chunk sizes
//!
//! Both implementations report byte spans into the original text so that a
//! window of tokens maps back to a contiguous slice of the source.

use std::path::Path;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;
use crate::error::{Error, Result};

/// Byte range of one token in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

/// Splits text into ordered, non-overlapping token spans
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>>;

    fn name(&self) -> &str;
}

/// Build the tokenizer selected by configuration
pub fn from_config(config: &TokenizerConfig) -> Result<Arc<dyn Tokenizer>> {
    match config {
        TokenizerConfig::Word => Ok(Arc::new(WordTokenizer)),
        TokenizerConfig::HuggingFace { path } => Ok(Arc::new(HfTokenizer::from_file(path)?)),
    }
}

/// Unicode word-boundary tokenizer; whitespace is not a token
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>> {
        Ok(text
            .split_word_bound_indices()
            .filter(|(_, segment)| !segment.trim().is_empty())
            .map(|(start, segment)| TokenSpan {
                start,
                end: start + segment.len(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "word"
    }
}

/// HuggingFace tokenizer loaded from a `tokenizer.json`
///
/// Use the file shipped with the embedding model so chunk sizes are counted
/// in the units the model consumes.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer, dropping any truncation or padding it ships with
    ///
    /// Model files such as all-MiniLM's cap encodings at the model's input
    /// length; chunking needs every token of the document.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Config(format!("Failed to load tokenizer {}: {}", path.display(), e))
        })?;
        inner.with_padding(None);
        inner.with_truncation(None).map_err(|e| {
            Error::Config(format!("Failed to disable truncation for {}: {}", path.display(), e))
        })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::internal(format!("Tokenization failed: {}", e)))?;

        // Offsets are byte offsets; zero-width entries carry no text
        Ok(encoding
            .get_offsets()
            .iter()
            .filter(|(start, end)| start < end)
            .map(|&(start, end)| TokenSpan { start, end })
            .collect())
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words<'a>(text: &'a str, spans: &[TokenSpan]) -> Vec<&'a str> {
        spans.iter().map(|s| &text[s.start..s.end]).collect()
    }

    #[test]
    fn test_word_tokenizer_skips_whitespace() {
        let text = "A B  C\nD";
        let spans = WordTokenizer.tokenize(text).unwrap();
        assert_eq!(words(text, &spans), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_word_tokenizer_keeps_punctuation() {
        let text = "Hello, world!";
        let spans = WordTokenizer.tokenize(text).unwrap();
        assert_eq!(words(text, &spans), vec!["Hello", ",", "world", "!"]);
    }

    #[test]
    fn test_word_tokenizer_unicode_spans_are_char_boundaries() {
        let text = "café naïve 日本";
        let spans = WordTokenizer.tokenize(text).unwrap();
        for span in &spans {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
        }
        assert_eq!(words(text, &spans)[0], "café");
    }

    const TRUNCATING_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": {
            "direction": "Right",
            "max_length": 4,
            "strategy": "LongestFirst",
            "stride": 0
        },
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[UNK]": 0, "a": 1, "b": 2, "c": 3, "d": 4,
                "e": 5, "f": 6, "g": 7, "h": 8
            },
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn test_hf_tokenizer_ignores_file_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, TRUNCATING_TOKENIZER).unwrap();

        let tokenizer = HfTokenizer::from_file(&path).unwrap();
        let text = "a b c d e f g h";
        let spans = tokenizer.tokenize(text).unwrap();
        assert_eq!(
            words(text, &spans),
            vec!["a", "b", "c", "d", "e", "f", "g", "h"]
        );

        let chunker =
            crate::ingestion::TokenChunker::new(Arc::new(tokenizer), 3, 1).unwrap();
        assert_eq!(
            chunker.split(text).unwrap(),
            vec!["a b c", "c d e", "e f g", "g h"]
        );
    }

    #[test]
    fn test_missing_tokenizer_file_is_config_error() {
        let err = HfTokenizer::from_file(Path::new("/nonexistent/tokenizer.json"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
