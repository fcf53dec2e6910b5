//! Batch sink implementations
//!
//! `PostgresSink` is the production destination; `InMemorySink` keeps the
//! same transactional semantics in process for dry runs and tests.

pub mod memory;
pub mod postgres;

pub use memory::{InMemorySink, InMemorySinkConfig};
pub use postgres::{PostgresSink, PostgresSinkConfig};
