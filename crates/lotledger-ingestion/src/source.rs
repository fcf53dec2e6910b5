//! Document sources
//!
//! A document source enumerates invoice documents and yields their text
//! lines. The document id is the invoice id, taken from the file stem.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use lotledger_core::RawTextLine;

use crate::extractors::ExtractorRegistry;
use crate::{IngestionError, Result};

/// Reference to one document in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Document (invoice) id
    pub id: String,
    /// Location of the document, if file-backed
    pub path: Option<PathBuf>,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A readable collection of text-bearing documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Enumerate documents. Failure here aborts the run before it starts.
    async fn list(&self) -> Result<Vec<DocumentRef>>;

    /// Read one document's text lines
    async fn read(&self, document: &DocumentRef) -> Result<Vec<RawTextLine>>;
}

/// Documents stored as files in a single directory
pub struct DirectoryDocumentSource {
    root: PathBuf,
    extensions: HashSet<String>,
    registry: ExtractorRegistry,
}

impl DirectoryDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: ["txt", "text"].iter().map(|e| e.to_string()).collect(),
            registry: ExtractorRegistry::with_defaults(),
        }
    }

    /// Restrict enumeration to these extensions. Unknown extensions are read
    /// as plain text.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        for ext in &self.extensions {
            if !self.registry.supports(ext) {
                self.registry.alias(ext, "txt");
            }
        }
        self
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentSource for DirectoryDocumentSource {
    async fn list(&self) -> Result<Vec<DocumentRef>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            IngestionError::Startup(format!(
                "Cannot enumerate documents in {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.accepts(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen = HashSet::new();
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                warn!(path = %path.display(), "Skipping document with non UTF-8 name");
                continue;
            };
            if !seen.insert(id.clone()) {
                warn!(document_id = %id, path = %path.display(), "Duplicate document id, skipping");
                continue;
            }
            documents.push(DocumentRef::new(id).with_path(path));
        }

        debug!(root = %self.root.display(), count = documents.len(), "Documents enumerated");
        Ok(documents)
    }

    async fn read(&self, document: &DocumentRef) -> Result<Vec<RawTextLine>> {
        let path = document
            .path
            .clone()
            .unwrap_or_else(|| self.root.join(format!("{}.txt", document.id)));

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| IngestionError::document_read(&document.id, e))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(document.id.as_str());

        let extractor = self
            .registry
            .get_by_filename(filename)
            .map_err(|e| IngestionError::document_read(&document.id, e))?;

        let extracted = extractor
            .extract(&content, Some(filename))
            .await
            .map_err(|e| IngestionError::document_read(&document.id, e))?;

        Ok(extracted.lines())
    }
}

/// Documents held in memory, used by tooling and tests
#[derive(Default)]
pub struct MemoryDocumentSource {
    order: Vec<String>,
    documents: HashMap<String, std::result::Result<String, String>>,
}

impl MemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        self.order.push(id.clone());
        self.documents.insert(id, Ok(text.into()));
        self
    }

    /// Add a document whose read always fails
    pub fn with_unreadable(mut self, id: impl Into<String>, reason: impl Into<String>) -> Self {
        let id = id.into();
        self.order.push(id.clone());
        self.documents.insert(id, Err(reason.into()));
        self
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn list(&self) -> Result<Vec<DocumentRef>> {
        Ok(self.order.iter().map(DocumentRef::new).collect())
    }

    async fn read(&self, document: &DocumentRef) -> Result<Vec<RawTextLine>> {
        match self.documents.get(&document.id) {
            Some(Ok(text)) => Ok(crate::extractors::ExtractedText::new(text, "utf-8").lines()),
            Some(Err(reason)) => Err(IngestionError::document_read(&document.id, reason)),
            None => Err(IngestionError::document_read(&document.id, "document not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_directory_listing_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("INV-2.txt"), "b").unwrap();
        std::fs::write(dir.path().join("INV-1.txt"), "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let source = DirectoryDocumentSource::new(dir.path());
        let docs = source.list().await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();

        assert_eq!(ids, vec!["INV-1", "INV-2"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_startup_error() {
        let source = DirectoryDocumentSource::new("/definitely/not/a/dir");
        let err = source.list().await.unwrap_err();
        assert!(matches!(err, IngestionError::Startup(_)));
    }

    #[tokio::test]
    async fn test_read_lines_from_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("INV-9.ocr"), "line one\nline two").unwrap();

        let source = DirectoryDocumentSource::new(dir.path()).with_extensions(["ocr"]);
        let docs = source.list().await.unwrap();
        assert_eq!(docs.len(), 1);

        let lines = source.read(&docs[0]).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "line two");
    }

    #[tokio::test]
    async fn test_read_vanished_file_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INV-4.txt");
        std::fs::write(&path, "x").unwrap();

        let source = DirectoryDocumentSource::new(dir.path());
        let docs = source.list().await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = source.read(&docs[0]).await.unwrap_err();
        assert!(matches!(err, IngestionError::DocumentRead { .. }));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryDocumentSource::new()
            .with_document("A", "hello")
            .with_unreadable("B", "corrupt scan");

        let docs = source.list().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(source.read(&docs[0]).await.unwrap()[0].text, "hello");
        assert!(source.read(&docs[1]).await.is_err());
    }
}
