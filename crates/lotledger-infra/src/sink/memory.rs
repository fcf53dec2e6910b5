//! In-memory batch sink
//!
//! Mirrors the all-or-nothing, skip-on-conflict contract of the database
//! sink, with hooks to inject failures for chosen documents.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use lotledger_core::{BatchReceipt, BatchSink, InventoryLineItem, LineItemId, SinkError};

/// Configuration for the in-memory sink
#[derive(Debug, Clone, Default)]
pub struct InMemorySinkConfig {
    /// Documents whose batches fail at commit time
    pub failing_documents: HashSet<String>,
    /// Position reported for injected failures (clamped to the batch length)
    pub failure_position: usize,
    /// Whether `health_check` reports the sink as unreachable
    pub unavailable: bool,
}

impl InMemorySinkConfig {
    pub fn with_failing_document(mut self, document_id: impl Into<String>) -> Self {
        self.failing_documents.insert(document_id.into());
        self
    }

    pub fn with_failure_position(mut self, position: usize) -> Self {
        self.failure_position = position;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

/// In-memory line item store
#[derive(Clone, Default)]
pub struct InMemorySink {
    rows: Arc<RwLock<HashMap<LineItemId, InventoryLineItem>>>,
    config: Arc<RwLock<InMemorySinkConfig>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InMemorySinkConfig) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Make batches for `document_id` fail from now on
    pub fn fail_document(&self, document_id: impl Into<String>) {
        self.config.write().failing_documents.insert(document_id.into());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        let mut config = self.config.write();
        config.failing_documents.clear();
        config.unavailable = false;
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn contains(&self, id: &LineItemId) -> bool {
        self.rows.read().contains_key(id)
    }

    /// Stored items for one document, in no particular order
    pub fn items_for_document(&self, document_id: &str) -> Vec<InventoryLineItem> {
        self.rows
            .read()
            .values()
            .filter(|item| item.document_id == document_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BatchSink for InMemorySink {
    async fn health_check(&self) -> Result<(), SinkError> {
        if self.config.read().unavailable {
            return Err(SinkError::Unavailable("in-memory sink marked unavailable".to_string()));
        }
        Ok(())
    }

    async fn save_batch(&self, items: &[InventoryLineItem]) -> Result<BatchReceipt, SinkError> {
        if items.is_empty() {
            return Ok(BatchReceipt::default());
        }

        {
            let config = self.config.read();
            if config.unavailable {
                return Err(SinkError::Unavailable(
                    "in-memory sink marked unavailable".to_string(),
                ));
            }
            if let Some(position) = items
                .iter()
                .position(|item| config.failing_documents.contains(&item.document_id))
            {
                let position = position.max(config.failure_position.min(items.len() - 1));
                warn!(
                    document_id = %items[position].document_id,
                    position,
                    "Injected batch failure, nothing written"
                );
                return Err(SinkError::ItemFailed {
                    position,
                    item_id: items[position].id,
                    message: "injected failure".to_string(),
                });
            }
        }

        // All checks passed, apply the whole batch under one lock
        let mut rows = self.rows.write();
        let mut receipt = BatchReceipt::default();
        for item in items {
            if rows.contains_key(&item.id) {
                receipt.skipped += 1;
            } else {
                rows.insert(item.id, item.clone());
                receipt.inserted += 1;
            }
        }

        debug!(
            inserted = receipt.inserted,
            skipped = receipt.skipped,
            "Batch committed to memory"
        );

        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use lotledger_core::{Category, Condition};

    fn item(document_id: &str, ordinal: usize, description: &str) -> InventoryLineItem {
        let price = BigDecimal::from(10);
        InventoryLineItem {
            id: LineItemId::from_content(document_id, ordinal, description, &price),
            document_id: document_id.to_string(),
            auction_id: "AUC-1".to_string(),
            name: description.to_string(),
            description: description.to_string(),
            category: Category::Other,
            condition: Condition::Unknown,
            quantity: 1,
            bid_amount: price.clone(),
            premium: BigDecimal::from(0),
            tax: BigDecimal::from(0),
            shipping_cost: BigDecimal::from(0),
            total_cost: price.clone(),
            cost_per_item: price,
            acquisition_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            keywords: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_skip_on_conflict() {
        let sink = InMemorySink::new();
        let batch = vec![item("D1", 0, "lamp"), item("D1", 1, "chair")];

        let first = sink.save_batch(&batch).await.unwrap();
        assert_eq!(first, BatchReceipt { inserted: 2, skipped: 0 });

        let second = sink.save_batch(&batch).await.unwrap();
        assert_eq!(second, BatchReceipt { inserted: 0, skipped: 2 });
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let sink = InMemorySink::with_config(
            InMemorySinkConfig::default()
                .with_failing_document("D2")
                .with_failure_position(1),
        );
        let batch = vec![item("D2", 0, "vase"), item("D2", 1, "rug"), item("D2", 2, "desk")];

        let err = sink.save_batch(&batch).await.unwrap_err();
        assert_eq!(err.position(), Some(1));
        assert!(sink.is_empty());

        sink.clear_failures();
        let receipt = sink.save_batch(&batch).await.unwrap();
        assert_eq!(receipt.inserted, 3);
        assert_eq!(sink.items_for_document("D2").len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_sink() {
        let sink = InMemorySink::with_config(InMemorySinkConfig::default().unavailable());
        assert!(matches!(
            sink.health_check().await,
            Err(SinkError::Unavailable(_))
        ));

        sink.clear_failures();
        assert!(sink.health_check().await.is_ok());
    }
}
