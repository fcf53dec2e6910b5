//! Resumable ingestion driver
//!
//! Walks a document source, builds each document's line items, persists them
//! as one all-or-nothing batch, and records the document in the checkpoint
//! only after its batch committed. Per-document failures are recorded and
//! reported; they never abort the run.
//!
//! Documents are processed in waves of `parallelism` documents. The
//! checkpoint has a single writer: outcomes of a wave are applied in document
//! order after the whole wave finished. Cancellation is observed between
//! waves, never while a batch is being persisted.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lotledger_core::{BatchSink, CheckpointStore, IngestionCheckpoint, IngestionConfig, SinkError};
use lotledger_infra::TimeoutPolicy;

use crate::metadata::AuctionMetadataRegistry;
use crate::pipeline::LineItemPipeline;
use crate::source::{DocumentRef, DocumentSource};
use crate::{IngestionError, Result};

/// Terminal state of one document within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Succeeded,
    FailedEmpty,
    FailedError,
    Skipped,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Succeeded => "succeeded",
            DocumentStatus::FailedEmpty => "failed_empty",
            DocumentStatus::FailedError => "failed_error",
            DocumentStatus::Skipped => "skipped",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DocumentStatus::FailedEmpty | DocumentStatus::FailedError)
    }
}

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub status: DocumentStatus,
    /// Line items built from the document
    pub items: usize,
    /// Items newly written by the sink
    pub inserted: usize,
    /// Items the sink already held
    pub duplicates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentOutcome {
    fn new(document_id: &str, status: DocumentStatus) -> Self {
        Self {
            document_id: document_id.to_string(),
            status,
            items: 0,
            inserted: 0,
            duplicates: 0,
            error: None,
        }
    }

    fn skipped(document_id: &str) -> Self {
        Self::new(document_id, DocumentStatus::Skipped)
    }

    fn failed(document_id: &str, status: DocumentStatus, error: &IngestionError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(document_id, status)
        }
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_documents: usize,
    /// Documents that were attempted (not skipped)
    pub processed: usize,
    pub succeeded: usize,
    pub failed_empty: usize,
    pub failed_error: usize,
    pub skipped: usize,
    /// Line items built by succeeded documents (persisted unless dry run)
    pub items_created: usize,
    pub items_inserted: usize,
    pub items_duplicate: usize,
    pub average_items_per_document: f64,
    pub failed_documents: Vec<String>,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Set when the final checkpoint save failed; committed documents will be
    /// re-read and skipped as duplicates by the sink on the next run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_error: Option<String>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome.status {
            DocumentStatus::Skipped => {
                self.skipped += 1;
                return;
            }
            DocumentStatus::Succeeded => {
                self.succeeded += 1;
                self.items_created += outcome.items;
                self.items_inserted += outcome.inserted;
                self.items_duplicate += outcome.duplicates;
            }
            DocumentStatus::FailedEmpty => self.failed_empty += 1,
            DocumentStatus::FailedError => self.failed_error += 1,
        }
        self.processed += 1;
        if outcome.status.is_failure() {
            self.failed_documents.push(outcome.document_id.clone());
        }
    }

    fn finish(&mut self, started: Instant) {
        self.average_items_per_document = if self.processed == 0 {
            0.0
        } else {
            self.items_created as f64 / self.processed as f64
        };
        self.elapsed_ms = started.elapsed().as_millis() as u64;
    }

    pub fn failed(&self) -> usize {
        self.failed_empty + self.failed_error
    }
}

/// Receives run progress for operator output
pub trait ProgressReporter: Send + Sync {
    /// Called once the document set is known
    fn on_start(&self, _total: usize, _dry_run: bool) {}

    /// Called before a document is handled, `index` is 1-based
    fn on_progress(&self, index: usize, total: usize, document_id: &str);

    fn on_outcome(&self, outcome: &DocumentOutcome);

    fn on_summary(&self, summary: &RunSummary);
}

/// Reports through `tracing` only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn on_progress(&self, index: usize, total: usize, document_id: &str) {
        debug!(index, total, document_id = %document_id, "Processing document");
    }

    fn on_outcome(&self, outcome: &DocumentOutcome) {
        match outcome.status {
            DocumentStatus::Succeeded => info!(
                document_id = %outcome.document_id,
                item_count = outcome.items,
                inserted = outcome.inserted,
                "Document ingested"
            ),
            DocumentStatus::Skipped => debug!(
                document_id = %outcome.document_id,
                "Already in checkpoint, skipped"
            ),
            DocumentStatus::FailedEmpty | DocumentStatus::FailedError => warn!(
                document_id = %outcome.document_id,
                status = outcome.status.as_str(),
                error = outcome.error.as_deref().unwrap_or_default(),
                "Document failed"
            ),
        }
    }

    fn on_summary(&self, summary: &RunSummary) {
        info!(
            total = summary.total_documents,
            succeeded = summary.succeeded,
            failed = summary.failed(),
            skipped = summary.skipped,
            items_created = summary.items_created,
            dry_run = summary.dry_run,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "Ingestion run finished"
        );
        if let Some(e) = &summary.checkpoint_error {
            error!(error = %e, "Checkpoint was not saved, the next run will re-read committed documents");
        }
    }
}

/// Driver behaviour switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Build items but neither persist them nor advance the checkpoint
    pub dry_run: bool,
    /// Reprocess documents already recorded in the checkpoint
    pub force: bool,
    /// Flush the checkpoint after this many newly succeeded documents
    pub flush_every: usize,
    /// Documents processed concurrently per wave
    pub parallelism: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            flush_every: 10,
            parallelism: 1,
        }
    }
}

impl DriverOptions {
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            flush_every: config.checkpoint_flush_interval.max(1),
            parallelism: config.parallelism.max(1),
            ..Default::default()
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every.max(1);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

/// Orchestrates a resumable ingestion run
pub struct IngestionDriver {
    source: Arc<dyn DocumentSource>,
    metadata: Arc<AuctionMetadataRegistry>,
    pipeline: Arc<LineItemPipeline>,
    sink: Arc<dyn BatchSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    timeouts: TimeoutPolicy,
    options: DriverOptions,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl IngestionDriver {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        metadata: Arc<AuctionMetadataRegistry>,
        sink: Arc<dyn BatchSink>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            source,
            metadata,
            pipeline: Arc::new(LineItemPipeline::new()),
            sink,
            checkpoints,
            timeouts: TimeoutPolicy::default(),
            options: DriverOptions::default(),
            reporter: Arc::new(TracingReporter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<LineItemPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run at the next wave boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Run over every document of the source.
    ///
    /// Returns `Err` only when the run cannot start: documents cannot be
    /// enumerated, the sink is unreachable or the checkpoint is unreadable.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        if self.cancel.is_cancelled() {
            warn!("Cancellation requested before the run started");
            let mut summary = RunSummary {
                dry_run: self.options.dry_run,
                cancelled: true,
                ..Default::default()
            };
            summary.finish(started);
            self.reporter.on_summary(&summary);
            return Ok(summary);
        }

        let mut checkpoint = self.load_checkpoint().await?;

        let documents = self.source.list().await.map_err(|e| match e {
            IngestionError::Startup(_) => e,
            other => IngestionError::Startup(format!("Cannot enumerate documents: {}", other)),
        })?;

        if !self.options.dry_run {
            self.check_sink().await?;
        }

        let total = documents.len();
        info!(
            documents = total,
            sink = self.sink.name(),
            checkpoint = %self.checkpoints.location(),
            dry_run = self.options.dry_run,
            force = self.options.force,
            parallelism = self.options.parallelism,
            "Starting ingestion run"
        );
        self.reporter.on_start(total, self.options.dry_run);

        let mut summary = RunSummary {
            total_documents: total,
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let mut unflushed = 0usize;

        for (wave_idx, wave) in documents.chunks(self.options.parallelism).enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    remaining = total - wave_idx * self.options.parallelism,
                    "Cancellation requested, stopping before next document"
                );
                summary.cancelled = true;
                break;
            }

            let base = wave_idx * self.options.parallelism;
            let tasks = wave.iter().enumerate().map(|(offset, document)| {
                self.reporter.on_progress(base + offset + 1, total, &document.id);
                let skip = !self.options.force && checkpoint.contains(&document.id);
                self.handle_document(document, skip)
            });
            let outcomes = join_all(tasks).await;

            for outcome in outcomes {
                self.reporter.on_outcome(&outcome);
                summary.record(&outcome);

                if outcome.status == DocumentStatus::Succeeded
                    && !self.options.dry_run
                    && checkpoint.mark_processed(outcome.document_id.as_str())
                {
                    unflushed += 1;
                }
            }

            if unflushed >= self.options.flush_every {
                match self.checkpoints.save(&checkpoint).await {
                    Ok(()) => unflushed = 0,
                    Err(e) => warn!(error = %e, "Checkpoint flush failed, retrying at next flush"),
                }
            }
        }

        if !self.options.dry_run {
            checkpoint.touch();
            if let Err(e) = self.checkpoints.save(&checkpoint).await {
                error!(
                    error = %e,
                    checkpoint = %self.checkpoints.location(),
                    "Final checkpoint save failed"
                );
                summary.checkpoint_error = Some(e.to_string());
            }
        }

        summary.finish(started);
        self.reporter.on_summary(&summary);
        Ok(summary)
    }

    async fn load_checkpoint(&self) -> Result<IngestionCheckpoint> {
        match self.checkpoints.load().await {
            Ok(checkpoint) => Ok(checkpoint),
            // Force mode reprocesses everything; an unreadable file is rebuilt
            Err(e) if self.options.force => {
                warn!(error = %e, "Ignoring unreadable checkpoint in force mode");
                Ok(IngestionCheckpoint::new())
            }
            Err(e) => Err(IngestionError::Startup(format!(
                "Cannot load checkpoint {}: {}",
                self.checkpoints.location(),
                e
            ))),
        }
    }

    async fn check_sink(&self) -> Result<()> {
        self.timeouts
            .execute_connect("sink_health_check", || self.sink.health_check())
            .await
            .map_err(|e| {
                IngestionError::Startup(format!("Sink {} unreachable: {}", self.sink.name(), e))
            })
    }

    async fn handle_document(&self, document: &DocumentRef, skip: bool) -> DocumentOutcome {
        if skip {
            return DocumentOutcome::skipped(&document.id);
        }

        match self.process_document(document).await {
            Ok(outcome) => outcome,
            Err(e @ IngestionError::EmptyExtraction(_)) => {
                warn!(document_id = %document.id, "No line items extracted");
                DocumentOutcome::failed(&document.id, DocumentStatus::FailedEmpty, &e)
            }
            Err(e) => {
                error!(document_id = %document.id, error = %e, "Document failed");
                DocumentOutcome::failed(&document.id, DocumentStatus::FailedError, &e)
            }
        }
    }

    async fn process_document(&self, document: &DocumentRef) -> Result<DocumentOutcome> {
        let lines = self
            .timeouts
            .execute_read("document_read", || self.source.read(document))
            .await
            .map_err(|e| e.into_error(|timeout| IngestionError::document_read(&document.id, timeout)))?;

        let metadata = self.metadata.lookup(&document.id);
        let items = self.pipeline.build(&lines, &metadata);

        if items.is_empty() {
            return Err(IngestionError::EmptyExtraction(document.id.clone()));
        }

        let mut outcome = DocumentOutcome::new(&document.id, DocumentStatus::Succeeded);
        outcome.items = items.len();

        if self.options.dry_run {
            debug!(document_id = %document.id, item_count = items.len(), "Dry run, not persisting");
            return Ok(outcome);
        }

        let receipt = self
            .timeouts
            .execute_write("save_batch", || self.sink.save_batch(&items))
            .await
            .map_err(|e| e.into_error(|timeout| SinkError::Timeout(timeout.to_string())))
            .map_err(|source| IngestionError::Persistence {
                document_id: document.id.clone(),
                source,
            })?;

        outcome.inserted = receipt.inserted;
        outcome.duplicates = receipt.skipped;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryDocumentSource;
    use lotledger_core::FinancialDefaults;
    use lotledger_infra::{FileCheckpointStore, InMemorySink, InMemorySinkConfig};
    use pretty_assertions::assert_eq;

    fn driver(
        source: MemoryDocumentSource,
        sink: InMemorySink,
        checkpoint: &std::path::Path,
    ) -> IngestionDriver {
        IngestionDriver::new(
            Arc::new(source),
            Arc::new(AuctionMetadataRegistry::new(FinancialDefaults::default())),
            Arc::new(sink),
            Arc::new(FileCheckpointStore::new(checkpoint)),
        )
    }

    #[tokio::test]
    async fn test_outcomes_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryDocumentSource::new()
            .with_document("INV-1", "Oak chair 20.00\nPine chest 30.00")
            .with_document("INV-2", "nothing priced here")
            .with_unreadable("INV-3", "scan missing");

        let summary = driver(source, InMemorySink::new(), &dir.path().join("cp.json"))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.total_documents, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed_empty, 1);
        assert_eq!(summary.failed_error, 1);
        assert_eq!(summary.items_created, 2);
        assert_eq!(summary.failed_documents, vec!["INV-2", "INV-3"]);
        assert!((summary.average_items_per_document - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = InMemorySink::with_config(InMemorySinkConfig::default().unavailable());
        let source = MemoryDocumentSource::new().with_document("INV-1", "Oak chair 20.00");

        let err = driver(source, sink, &dir.path().join("cp.json"))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::Startup(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let sink = InMemorySink::new();
        let source = MemoryDocumentSource::new().with_document("INV-1", "Oak chair 20.00");
        let reporter = Arc::new(CapturingReporter::default());
        let driver = driver(source, sink.clone(), &dir.path().join("cp.json"))
            .with_reporter(reporter.clone());
        driver.cancellation_token().cancel();

        let summary = driver.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 0);
        assert!(sink.is_empty());
        assert!(!dir.path().join("cp.json").exists());
        assert_eq!(reporter.summary.lock().as_ref(), Some(&summary));
    }

    /// Loads fine, never saves
    struct ReadOnlyCheckpoints;

    #[async_trait::async_trait]
    impl CheckpointStore for ReadOnlyCheckpoints {
        async fn load(&self) -> lotledger_core::Result<IngestionCheckpoint> {
            Ok(IngestionCheckpoint::new())
        }

        async fn save(&self, _checkpoint: &IngestionCheckpoint) -> lotledger_core::Result<()> {
            Err(lotledger_core::CoreError::Checkpoint("disk full".to_string()))
        }

        fn location(&self) -> String {
            "read-only".to_string()
        }
    }

    #[derive(Default)]
    struct CapturingReporter {
        summary: parking_lot::Mutex<Option<RunSummary>>,
    }

    impl ProgressReporter for CapturingReporter {
        fn on_progress(&self, _index: usize, _total: usize, _document_id: &str) {}

        fn on_outcome(&self, _outcome: &DocumentOutcome) {}

        fn on_summary(&self, summary: &RunSummary) {
            *self.summary.lock() = Some(summary.clone());
        }
    }

    #[tokio::test]
    async fn test_failed_final_checkpoint_save_still_reports_summary() {
        let sink = InMemorySink::new();
        let source = MemoryDocumentSource::new()
            .with_document("INV-A", "Lamp 4.00")
            .with_document("INV-B", "no lots here");
        let reporter = Arc::new(CapturingReporter::default());

        let summary = IngestionDriver::new(
            Arc::new(source),
            Arc::new(AuctionMetadataRegistry::new(FinancialDefaults::default())),
            Arc::new(sink.clone()),
            Arc::new(ReadOnlyCheckpoints),
        )
        .with_reporter(reporter.clone())
        .run()
        .await
        .unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed_documents, vec!["INV-B"]);
        assert!(summary.checkpoint_error.as_deref().unwrap().contains("disk full"));
        assert_eq!(reporter.summary.lock().as_ref(), Some(&summary));
    }

    /// Health check and writes that never answer in time
    struct StallingSink {
        stall_health_check: bool,
    }

    #[async_trait::async_trait]
    impl BatchSink for StallingSink {
        async fn health_check(&self) -> std::result::Result<(), SinkError> {
            if self.stall_health_check {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            Ok(())
        }

        async fn save_batch(
            &self,
            items: &[lotledger_core::InventoryLineItem],
        ) -> std::result::Result<lotledger_core::BatchReceipt, SinkError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(lotledger_core::BatchReceipt {
                inserted: items.len(),
                skipped: 0,
            })
        }

        fn name(&self) -> &'static str {
            "stalling"
        }
    }

    fn stalling_driver(stall_health_check: bool, checkpoint: &std::path::Path) -> IngestionDriver {
        IngestionDriver::new(
            Arc::new(MemoryDocumentSource::new().with_document("INV-1", "Oak chair 20.00")),
            Arc::new(AuctionMetadataRegistry::new(FinancialDefaults::default())),
            Arc::new(StallingSink { stall_health_check }),
            Arc::new(FileCheckpointStore::new(checkpoint)),
        )
        .with_timeouts(
            TimeoutPolicy::default()
                .with_connect_timeout(std::time::Duration::from_millis(20))
                .with_write_timeout(std::time::Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_write_timeout_fails_document_only() {
        let dir = tempfile::tempdir().unwrap();

        let summary = stalling_driver(false, &dir.path().join("cp.json"))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed_error, 1);
        assert_eq!(summary.failed_documents, vec!["INV-1"]);
        assert!(summary.checkpoint_error.is_none());
    }

    #[tokio::test]
    async fn test_health_check_timeout_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = stalling_driver(true, &dir.path().join("cp.json"))
            .run()
            .await
            .unwrap_err();

        match err {
            IngestionError::Startup(message) => assert!(message.contains("timed out")),
            other => panic!("expected startup error, got {}", other),
        }
    }

    #[test]
    fn test_options_clamp_to_one() {
        let options = DriverOptions::default().with_parallelism(0).with_flush_every(0);
        assert_eq!(options.parallelism, 1);
        assert_eq!(options.flush_every, 1);
    }
}
