// Segment retry: bounded attempts for transport failures, optional pause between attempts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::VodError;

/// Attempts allowed per segment before the whole batch is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per segment, counting the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Pause between attempts. Zero retries immediately.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    Success(T),
    /// Transport failure, worth another attempt
    Retry(VodError),
    /// Anything else: stop immediately
    Fail(VodError),
}

/// Why [`retry_with_policy`] gave up, and after how many attempts.
#[derive(Debug)]
pub struct RetryError {
    pub source: VodError,
    pub attempts: u32,
}

impl RetryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, VodError::Cancelled)
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts.
///
/// The closure receives the 1-based attempt number. Cancellation is observed before every
/// attempt and during the pause between attempts.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T, RetryError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if token.is_cancelled() {
            return Err(RetryError {
                source: VodError::Cancelled,
                attempts: attempt - 1,
            });
        }

        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(source) => {
                return Err(RetryError {
                    source,
                    attempts: attempt,
                });
            }
            RetryAction::Retry(source) => {
                if attempt >= max_attempts {
                    warn!(attempts = attempt, error = %source, "Giving up after transient errors");
                    return Err(RetryError {
                        source,
                        attempts: attempt,
                    });
                }
                debug!(
                    attempt,
                    max = max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %source,
                    "Retrying after transient error"
                );
                if !policy.delay.is_zero() {
                    tokio::select! {
                        _ = token.cancelled() => {
                            return Err(RetryError {
                                source: VodError::Cancelled,
                                attempts: attempt,
                            });
                        }
                        _ = tokio::time::sleep(policy.delay) => {}
                    }
                }
            }
        }
    }
}
