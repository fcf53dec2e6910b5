//! Resilience helpers for ingestion I/O
//!
//! Every document read and batch commit runs under a bounded timeout so a
//! single stalled document cannot hold up a whole run.

pub mod timeout;

pub use timeout::{TimeoutError, TimeoutOrError, TimeoutPolicy};
