use std::future::Future;
use std::time::Duration;

use crate::core::{PassError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential-backoff wrapper for storage calls.
///
/// Domain rejections (validation, not-found, emergency mode) are rethrown
/// immediately; only substrate faults are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub async fn with_retry<T, F, Fut>(&self, op_name: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err: Option<PassError> = None;
        for attempt in 0..=self.max_retries {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        operation = op_name,
                        attempt,
                        error = %err,
                        "storage operation failed, will retry"
                    );
                    last_err = Some(err);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.base_delay * 2u32.pow(attempt)).await;
                    }
                }
            }
        }
        Err(PassError::StorageExhausted {
            attempts: self.max_retries + 1,
            last: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}
