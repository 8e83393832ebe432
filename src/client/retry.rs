//! Retrying of transient API failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::config::DEFAULT_RETRY_TIMEOUT;
use crate::error::ProviderError;

/// First delay between attempts.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Longest delay between attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff bounded by a total time budget.
///
/// Only errors for which [`ProviderError::is_retryable`] holds are retried;
/// every other error is returned unchanged after the attempt that produced
/// it. When the budget runs out the last error is wrapped in
/// [`ProviderError::RetriesExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time budget measured from the first attempt.
    pub timeout: Duration,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound of the delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RETRY_TIMEOUT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given budget and default backoff.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Override the backoff bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Run `call` until it succeeds, fails terminally or the budget is spent.
    ///
    /// The last delay is shortened to what is left of the budget, so one
    /// more attempt is made right at the deadline. A budget too large to
    /// represent as an instant never runs out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let deadline = Instant::now().checked_add(self.timeout);
        let mut backoff = self.initial_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            let delay = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ProviderError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts,
                            source: Box::new(err),
                        });
                    }
                    backoff.min(remaining)
                },
                None => backoff,
            };

            warn!(
                operation,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient CircleCI API failure, retrying"
            );
            sleep(delay).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }
}
