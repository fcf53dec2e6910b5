//! Document Text Extractors
//!
//! Converts raw document bytes into page-ordered text lines. PDF decoding
//! happens upstream; extractors here receive already text-bearing documents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use lotledger_core::RawTextLine;

use crate::{IngestionError, Result};

/// Page separator emitted by common text extractors (form feed)
const PAGE_BREAK: char = '\u{000C}';

/// Result of text extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Text of each page, in order
    pub pages: Vec<String>,
    /// Character encoding used
    pub encoding: String,
    /// Warnings during extraction
    pub warnings: Vec<String>,
}

impl ExtractedText {
    pub fn new(text: &str, encoding: impl Into<String>) -> Self {
        Self {
            pages: text.split(PAGE_BREAK).map(str::to_string).collect(),
            encoding: encoding.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Flatten into lines ordered by page, then by position within the page
    pub fn lines(&self) -> Vec<RawTextLine> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(page_idx, page)| {
                page.lines().enumerate().map(move |(line_idx, text)| {
                    RawTextLine::new(page_idx as u32 + 1, line_idx as u32 + 1, text)
                })
            })
            .collect()
    }
}

/// Trait for document text extractors
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from document content
    async fn extract(&self, content: &[u8], filename: Option<&str>) -> Result<ExtractedText>;

    /// File extensions this extractor understands (lowercase, without dot)
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// Get extractor name
    fn name(&self) -> &'static str;
}

/// Plain text extractor
pub struct PlainTextExtractor {
    /// Maximum content size to process
    max_size: usize,
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self {
            max_size: 16 * 1024 * 1024, // 16MB default
        }
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8], filename: Option<&str>) -> Result<ExtractedText> {
        if content.len() > self.max_size {
            return Err(IngestionError::ExtractionFailed(format!(
                "Content too large: {} bytes (max {})",
                content.len(),
                self.max_size
            )));
        }

        let result = match std::str::from_utf8(content) {
            Ok(s) => ExtractedText::new(s.trim_start_matches('\u{FEFF}'), "utf-8"),
            Err(_) => {
                // OCR exports from older tooling are frequently Windows-1252
                let (decoded, encoding, had_errors) = encoding_rs::WINDOWS_1252.decode(content);
                let label = if had_errors {
                    "windows-1252-lossy"
                } else {
                    encoding.name()
                };
                warn!(
                    filename = filename.unwrap_or("unknown"),
                    encoding = label,
                    "Document is not valid UTF-8, decoded with fallback"
                );
                ExtractedText::new(&decoded, label)
                    .with_warning(format!("decoded with {} fallback", label))
            }
        };

        debug!(
            encoding = %result.encoding,
            pages = result.pages.len(),
            size = content.len(),
            "Extracted plain text"
        );

        Ok(result)
    }

    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["txt", "text"]
    }

    fn name(&self) -> &'static str {
        "plain_text"
    }
}

/// Registry of extractors keyed by file extension
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextExtractor::new()));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        for ext in extractor.supported_extensions() {
            self.by_extension.insert(ext.to_string(), Arc::clone(&extractor));
        }
    }

    /// Map an additional extension onto an already registered one
    pub fn alias(&mut self, extension: &str, existing: &str) -> bool {
        match self.by_extension.get(&existing.to_lowercase()).cloned() {
            Some(extractor) => {
                self.by_extension.insert(extension.to_lowercase(), extractor);
                true
            }
            None => false,
        }
    }

    pub fn get_by_extension(&self, extension: &str) -> Option<Arc<dyn TextExtractor>> {
        self.by_extension.get(&extension.to_lowercase()).cloned()
    }

    pub fn get_by_filename(&self, filename: &str) -> Result<Arc<dyn TextExtractor>> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.get_by_extension(extension)
            .ok_or_else(|| IngestionError::UnsupportedType(filename.to_string()))
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.by_extension.contains_key(&extension.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_plain_text_lines_carry_page_numbers() {
        let extractor = PlainTextExtractor::new();
        let text = "LOT DESCRIPTION PRICE\r\nTea set 10.00\u{000C}Second page line";

        let result = extractor.extract(text.as_bytes(), Some("a.txt")).await.unwrap();
        let lines = result.lines();

        assert_eq!(result.pages.len(), 2);
        assert_eq!(lines[0], RawTextLine::new(1, 1, "LOT DESCRIPTION PRICE"));
        assert_eq!(lines[1], RawTextLine::new(1, 2, "Tea set 10.00"));
        assert_eq!(lines[2], RawTextLine::new(2, 1, "Second page line"));
    }

    #[tokio::test]
    async fn test_windows_1252_fallback() {
        let extractor = PlainTextExtractor::new();
        // "Café" with 0xE9 for é
        let bytes = [0x43, 0x61, 0x66, 0xE9];

        let result = extractor.extract(&bytes, None).await.unwrap();

        assert_eq!(result.pages[0], "Café");
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_size_limit() {
        let extractor = PlainTextExtractor::new().with_max_size(4);
        let err = extractor.extract(b"too long", None).await.unwrap_err();
        assert!(matches!(err, IngestionError::ExtractionFailed(_)));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ExtractorRegistry::with_defaults();

        assert!(registry.get_by_filename("INV-1.TXT").is_ok());
        assert!(matches!(
            registry.get_by_filename("INV-1.pdf"),
            Err(IngestionError::UnsupportedType(_))
        ));

        assert!(registry.alias("ocr", "txt"));
        assert!(registry.supports("OCR"));
        assert!(!registry.alias("doc", "pdf"));
    }
}
