//! Async utilities
//!
//! Storage calls made on the request path are bounded; an elapsed bound is
//! reported as `GymError::Timeout` and never retried here.

use crate::error::{ErrorContext, GymError, GymResult};
use std::future::Future;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Execute a future with a timeout
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> GymResult<T>
where
    F: Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = timeout_ms,
                "Operation timed out"
            );
            Err(GymError::Timeout {
                operation: operation_name.to_string(),
                duration_ms: timeout_ms,
                context: ErrorContext::new("async_utils")
                    .with_operation("timeout")
                    .with_metadata("timeout_ms", &timeout_ms.to_string()),
            })
        }
    }
}

/// Execute a fallible future with a timeout, flattening both failure modes
/// into a single `GymError`.
pub async fn bounded<F, T, E>(future: F, timeout_ms: u64, operation_name: &str) -> GymResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<GymError>,
{
    with_timeout(future, timeout_ms, operation_name)
        .await?
        .map_err(Into::into)
}
