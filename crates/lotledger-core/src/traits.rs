//! Seams between the ingestion core and its storage collaborators.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{IngestionCheckpoint, InventoryLineItem, LineItemId};

/// Failure of a batch sink operation
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Insert failed at position {position} (item {item_id}): {message}")]
    ItemFailed {
        position: usize,
        item_id: LineItemId,
        message: String,
    },

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Sink operation timed out: {0}")]
    Timeout(String),
}

impl SinkError {
    /// Position of the failing item within the batch, if the failure is item-specific
    pub fn position(&self) -> Option<usize> {
        match self {
            SinkError::ItemFailed { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Outcome of a committed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Rows actually written
    pub inserted: usize,
    /// Rows skipped because their identity already existed
    pub skipped: usize,
}

impl BatchReceipt {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped
    }
}

/// Destination for one document's line items.
///
/// `save_batch` is all-or-nothing: either every item is inserted (or skipped
/// on identity conflict) and committed, or nothing is.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Verify the sink is reachable before a run starts
    async fn health_check(&self) -> Result<(), SinkError>;

    /// Insert all items in a single transaction
    async fn save_batch(&self, items: &[InventoryLineItem]) -> Result<BatchReceipt, SinkError>;

    /// Sink name for logging
    fn name(&self) -> &'static str;
}

/// Durable storage for the ingestion checkpoint. Single writer only.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last saved checkpoint, or an empty one if none exists
    async fn load(&self) -> crate::Result<IngestionCheckpoint>;

    /// Persist the checkpoint, replacing the previous version
    async fn save(&self, checkpoint: &IngestionCheckpoint) -> crate::Result<()>;

    /// Human-readable location of the store
    fn location(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_sink_error_position() {
        let err = SinkError::ItemFailed {
            position: 3,
            item_id: LineItemId::from_uuid(Uuid::nil()),
            message: "constraint violated".to_string(),
        };
        assert_eq!(err.position(), Some(3));
        assert!(err.to_string().contains("position 3"));
        assert_eq!(SinkError::Unavailable("down".into()).position(), None);
    }

    #[test]
    fn test_batch_receipt_total() {
        let receipt = BatchReceipt {
            inserted: 4,
            skipped: 2,
        };
        assert_eq!(receipt.total(), 6);
    }
}
