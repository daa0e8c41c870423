//! Pluggable text extraction selected by content type

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::Metadata;

/// Content type of an ingested file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentType {
    Text,
    Pdf,
    /// Anything else, carried by name for error reporting
    Other(String),
}

impl ContentType {
    /// Guess the content type from a file path
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "text" | "md" | "markdown" => return ContentType::Text,
            "pdf" => return ContentType::Pdf,
            _ => {}
        }

        match mime_guess::from_path(path).first() {
            Some(mime) if mime.essence_str() == "application/pdf" => ContentType::Pdf,
            Some(mime) if mime.essence_str() == "text/plain" => ContentType::Text,
            Some(mime) => ContentType::Other(mime.essence_str().to_string()),
            None if extension.is_empty() => ContentType::Other("unknown".to_string()),
            None => ContentType::Other(extension),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Text => "text",
            ContentType::Pdf => "pdf",
            ContentType::Other(name) => name,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "text" | "txt" | "text/plain" => ContentType::Text,
            "pdf" | "application/pdf" => ContentType::Pdf,
            other => ContentType::Other(other.to_string()),
        })
    }
}

/// Text pulled out of a file, with format-specific metadata
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub metadata: Metadata,
}

/// Turns raw file bytes into text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, source_name: &str, data: Vec<u8>) -> Result<ExtractedText>;

    fn name(&self) -> &str;
}

/// Strict UTF-8 decoding
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, source_name: &str, data: Vec<u8>) -> Result<ExtractedText> {
        let text = String::from_utf8(data)
            .map_err(|e| Error::extraction(source_name, format!("not valid UTF-8: {}", e)))?;
        Ok(ExtractedText {
            text,
            metadata: Metadata::new(),
        })
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// PDF extraction via pdf-extract, falling back to lopdf
///
/// Runs on the blocking pool under a deadline; some fonts make pdf-extract
/// spin for a long time.
#[derive(Debug)]
pub struct PdfExtractor {
    timeout: Duration,
}

impl PdfExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn extract_blocking(source_name: &str, data: &[u8]) -> Result<ExtractedText> {
        let page_count = lopdf::Document::load_mem(data)
            .map(|doc| doc.get_pages().len())
            .ok();

        let raw = match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("pdf-extract failed for {}: {}, trying lopdf", source_name, e);
                Self::extract_with_lopdf(source_name, data)?
            }
        };

        let text = normalize_pdf_text(&raw);
        if text.is_empty() {
            return Err(Error::extraction(
                source_name,
                "no extractable text; the PDF may be image-based or encrypted",
            ));
        }

        let mut metadata = Metadata::new();
        if let Some(pages) = page_count {
            metadata.insert("page_count".to_string(), pages.to_string());
        }
        Ok(ExtractedText { text, metadata })
    }

    fn extract_with_lopdf(source_name: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(source_name, format!("failed to load PDF: {}", e)))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages)
            .map_err(|e| Error::extraction(source_name, format!("failed to read PDF text: {}", e)))
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, source_name: &str, data: Vec<u8>) -> Result<ExtractedText> {
        let name = source_name.to_string();
        let task = tokio::task::spawn_blocking(move || {
            catch_panic(&name, || Self::extract_blocking(&name, &data))
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::extraction(
                source_name,
                format!("extraction task failed: {}", join_err),
            )),
            Err(_) => Err(Error::extraction(
                source_name,
                format!("extraction timed out after {:?}", self.timeout),
            )),
        }
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Run an extraction, turning a panic inside the parser into an error
///
/// pdf-extract panics on some malformed fonts and cross-reference tables.
fn catch_panic<F>(source_name: &str, extract: F) -> Result<ExtractedText>
where
    F: FnOnce() -> Result<ExtractedText>,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(extract)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("PDF parser panicked on {}: {}", source_name, reason);
        Err(Error::extraction(source_name, format!("parser panicked: {}", reason)))
    })
}

/// Collapse blank lines and strip NULs left by PDF text layers
fn normalize_pdf_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extractors keyed by content type
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<ContentType, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with the built-in text and PDF extractors
    pub fn with_defaults(pdf_timeout: Duration) -> Self {
        let mut registry = Self::default();
        registry.register(ContentType::Text, Arc::new(PlainTextExtractor));
        registry.register(ContentType::Pdf, Arc::new(PdfExtractor::new(pdf_timeout)));
        registry
    }

    pub fn register(&mut self, content_type: ContentType, extractor: Arc<dyn TextExtractor>) {
        self.extractors.insert(content_type, extractor);
    }

    /// Look up the extractor for a content type
    pub fn get(&self, content_type: &ContentType) -> Result<Arc<dyn TextExtractor>> {
        self.extractors
            .get(content_type)
            .cloned()
            .ok_or_else(|| Error::UnsupportedFormat(content_type.to_string()))
    }

    pub fn supports(&self, content_type: &ContentType) -> bool {
        self.extractors.contains_key(content_type)
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.extractors.keys().map(ContentType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ExtractorRegistry").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_content_type_from_path() {
        assert_eq!(ContentType::from_path(Path::new("notes.txt")), ContentType::Text);
        assert_eq!(ContentType::from_path(Path::new("README.MD")), ContentType::Text);
        assert_eq!(ContentType::from_path(Path::new("paper.pdf")), ContentType::Pdf);
        assert!(matches!(
            ContentType::from_path(Path::new("sheet.xlsx")),
            ContentType::Other(_)
        ));
        assert_eq!(
            ContentType::from_path(Path::new("noext")),
            ContentType::Other("unknown".to_string())
        );
    }

    #[test]
    fn test_content_type_from_str() {
        assert_eq!("TEXT".parse::<ContentType>().unwrap(), ContentType::Text);
        assert_eq!("application/pdf".parse::<ContentType>().unwrap(), ContentType::Pdf);
        assert_eq!(
            "docx".parse::<ContentType>().unwrap(),
            ContentType::Other("docx".to_string())
        );
    }

    #[tokio::test]
    async fn test_plain_text_rejects_invalid_utf8() {
        let err = PlainTextExtractor
            .extract("bad.txt", vec![0xff, 0xfe, 0x00])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailure);

        let ok = PlainTextExtractor
            .extract("good.txt", b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(ok.text, "hello");
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_extraction_failure() {
        let err = PdfExtractor::new(Duration::from_secs(5))
            .extract("broken.pdf", b"definitely not a pdf".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
    }

    #[test]
    fn test_registry_unsupported() {
        let registry = ExtractorRegistry::with_defaults(Duration::from_secs(1));
        assert!(registry.supports(&ContentType::Pdf));
        let err = registry
            .get(&ContentType::Other("docx".into()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_parser_panic_becomes_extraction_failure() {
        let err = catch_panic("fonts.pdf", || panic!("bad font widths")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
        assert!(err.to_string().contains("bad font widths"));

        let ok = catch_panic("fine.pdf", || {
            Ok(ExtractedText {
                text: "fine".to_string(),
                metadata: Metadata::new(),
            })
        })
        .unwrap();
        assert_eq!(ok.text, "fine");
    }

    #[test]
    fn test_normalize_pdf_text() {
        assert_eq!(normalize_pdf_text("  a \n\n\0b\n  "), "a\nb");
    }
}
