//! Core types, seams, and configuration for lotledger.
//!
//! Everything the ingestion pipeline exchanges with the outside world is
//! declared here: the persisted line-item record, the per-document auction
//! metadata, the checkpoint, and the narrow `BatchSink` / `CheckpointStore`
//! contracts that concrete adapters implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use self::config::*;
pub use error::*;
pub use types::*;

pub use traits::{BatchReceipt, BatchSink, CheckpointStore, SinkError};
