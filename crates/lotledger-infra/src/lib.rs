pub mod checkpoint;
pub mod resilience;
pub mod sink;

pub use checkpoint::FileCheckpointStore;
pub use resilience::{TimeoutError, TimeoutOrError, TimeoutPolicy};
pub use sink::memory::{InMemorySink, InMemorySinkConfig};
pub use sink::postgres::{PostgresSink, PostgresSinkConfig};

#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timed out: {0}")]
    Timeout(#[from] TimeoutError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InfraError>;
