//! Timeout helpers
//!
//! Every suspension point that waits on an LLM is wrapped here so elapsed
//! time surfaces as `LensError::Timeout` with the operation name attached.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let text = with_timeout(
//!     Duration::from_secs(30),
//!     provider.complete(prompt, 3000, 0.3),
//!     "openrouter completion",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{LensError, Result};

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LensError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, mapping the inner result
///
/// This variant accepts futures that return non-Result types and wraps them.
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(LensError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, LensError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_passes_inner_error() {
        let result: Result<u8> = with_timeout(
            Duration::from_secs(1),
            async { Err(LensError::LlmApi("boom".into())) },
            "test operation",
        )
        .await;
        assert!(matches!(result, Err(LensError::LlmApi(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, LensError>(42)
            },
            "slow operation",
        )
        .await;
        match result {
            Err(LensError::Timeout { operation, duration }) => {
                assert_eq!(operation, "slow operation");
                assert_eq!(duration, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_map_expires() {
        let result = with_timeout_map(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(1)),
            "sleep",
        )
        .await;
        assert!(result.unwrap_err().is_timeout());
    }
}
