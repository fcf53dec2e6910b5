//! Timeout handling
//!
//! Provides configurable timeouts for document reads and sink writes.

use lotledger_core::TimeoutConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Timeout error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation '{operation}' timed out after {duration:?}")]
pub struct TimeoutError {
    /// Duration that was exceeded
    pub duration: Duration,
    /// Operation name
    pub operation: String,
}

/// Timeout policy for the ingestion run
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    /// Timeout for reading and extracting one document
    pub read_timeout: Duration,
    /// Timeout for committing one document's batch
    pub write_timeout: Duration,
    /// Timeout for establishing sink connections
    pub connect_timeout: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

impl TimeoutPolicy {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            read_timeout: config.document_read(),
            write_timeout: config.persist(),
            connect_timeout: config.connect(),
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Execute a fallible read operation
    pub async fn execute_read<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_timeout(operation_name, self.read_timeout, operation)
            .await
    }

    /// Execute a fallible write operation
    pub async fn execute_write<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_timeout(operation_name, self.write_timeout, operation)
            .await
    }

    /// Execute a fallible connect or health check operation
    pub async fn execute_connect<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_timeout(operation_name, self.connect_timeout, operation)
            .await
    }

    /// Execute a fallible operation with a specific timeout, flattening both
    /// failure kinds
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        operation_name: &str,
        timeout: Duration,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(TimeoutOrError::Error(e)),
            Err(_) => {
                warn!(
                    operation = operation_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(TimeoutOrError::Timeout(TimeoutError {
                    duration: timeout,
                    operation: operation_name.to_string(),
                }))
            }
        }
    }
}

/// Either a timeout or an operation error
#[derive(Debug, Error)]
pub enum TimeoutOrError<E> {
    #[error(transparent)]
    Timeout(TimeoutError),
    #[error("{0}")]
    Error(E),
}

impl<E> TimeoutOrError<E> {
    /// Collapse into the operation's own error type
    pub fn into_error(self, on_timeout: impl FnOnce(TimeoutError) -> E) -> E {
        match self {
            TimeoutOrError::Timeout(timeout) => on_timeout(timeout),
            TimeoutOrError::Error(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_within_timeout() {
        let policy = TimeoutPolicy::default();

        let result: Result<i32, TimeoutOrError<&str>> =
            policy.execute_read("read", || async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_operation_error_is_passed_through() {
        let policy = TimeoutPolicy::default();

        let result: Result<i32, TimeoutOrError<&str>> =
            policy.execute_write("save_batch", || async { Err("constraint") }).await;

        assert!(matches!(result, Err(TimeoutOrError::Error("constraint"))));
    }

    #[tokio::test]
    async fn test_write_timeout_exceeded() {
        let policy = TimeoutPolicy::default().with_write_timeout(Duration::from_millis(10));

        let err = policy
            .execute_write("save_batch", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();

        match err {
            TimeoutOrError::Timeout(e) => {
                assert_eq!(e.operation, "save_batch");
                assert_eq!(e.duration, Duration::from_millis(10));
            }
            TimeoutOrError::Error(e) => panic!("expected timeout, got {}", e),
        }
    }

    #[tokio::test]
    async fn test_into_error_maps_timeout() {
        let policy = TimeoutPolicy::default().with_connect_timeout(Duration::from_millis(10));

        let err = policy
            .execute_connect("health_check", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<(), String>(())
            })
            .await
            .unwrap_err()
            .into_error(|t| format!("unreachable: {}", t));

        assert!(err.starts_with("unreachable: Operation 'health_check' timed out"));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = TimeoutPolicy::from_config(&TimeoutConfig::default());
        assert_eq!(policy.read_timeout, Duration::from_secs(30));
        assert_eq!(policy.write_timeout, Duration::from_secs(60));
        assert_eq!(policy.connect_timeout, Duration::from_secs(10));
    }
}
