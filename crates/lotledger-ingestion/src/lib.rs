//! Auction invoice ingestion for lotledger
//!
//! Turns OCR'd invoice text into persisted inventory line items:
//!
//! - Line reconstruction: a small state machine that recovers
//!   `(description, price)` lots from loosely structured lines
//! - Noise stripping of embedded lot and item codes
//! - Weighted category and first-match condition classification
//! - Keyword extraction for search indexing
//! - Exact decimal premium, tax, and cost computation
//! - A resumable, checkpointed driver with dry-run and force modes

pub mod classifier;
pub mod driver;
pub mod extractors;
pub mod financial;
pub mod keywords;
pub mod metadata;
pub mod pipeline;
pub mod processors;
pub mod reconstruct;
pub mod source;

// Re-exports
pub use classifier::{CategoryRule, ConditionRule, ItemClassifier, Taxonomy};
pub use driver::{
    DocumentOutcome, DocumentStatus, DriverOptions, IngestionDriver, ProgressReporter,
    RunSummary, TracingReporter,
};
pub use extractors::{ExtractedText, ExtractorRegistry, PlainTextExtractor, TextExtractor};
pub use financial::{round_half_up, CostBreakdown, CostInput, FinancialCalculator};
pub use keywords::KeywordExtractor;
pub use metadata::AuctionMetadataRegistry;
pub use pipeline::LineItemPipeline;
pub use processors::NoiseStripper;
pub use reconstruct::{LineReconstructor, Reconstruction, ReconstructorState};
pub use source::{DirectoryDocumentSource, DocumentRef, DocumentSource, MemoryDocumentSource};

use lotledger_core::{CoreError, SinkError};

/// Error types for ingestion operations
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Failed to read document {document_id}: {message}")]
    DocumentRead { document_id: String, message: String },

    #[error("No line items extracted from document {0}")]
    EmptyExtraction(String),

    #[error("Failed to persist document {document_id}: {source}")]
    Persistence {
        document_id: String,
        #[source]
        source: SinkError,
    },

    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn document_read(document_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        IngestionError::DocumentRead {
            document_id: document_id.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestionError::EmptyExtraction("INV-9".to_string());
        assert_eq!(err.to_string(), "No line items extracted from document INV-9");

        let err = IngestionError::document_read("INV-3", "permission denied");
        assert!(err.to_string().contains("INV-3"));
    }
}
