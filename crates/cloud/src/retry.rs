//! Per-provider retry policies.
//!
//! Each integration owns an explicit [`RetryPolicy`]. The synchronous image
//! backend retries only transport failures; the vision client also retries
//! 5xx responses. The poll-based backend handles 5xx inside its status loop.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Tunable parameters for a bounded exponential-backoff retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Retry when the request never produced a response.
    pub retry_transport: bool,
    /// Retry on 5xx responses.
    pub retry_server_errors: bool,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Synchronous image generation: transport failures only.
    pub const SYNC_IMAGE: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        retry_transport: true,
        retry_server_errors: false,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        multiplier: 2.0,
    };

    /// Submitting a prediction to a poll-based backend.
    pub const POLL_SUBMIT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        retry_transport: true,
        retry_server_errors: false,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        multiplier: 2.0,
    };

    /// Vision analysis: transport failures and 5xx.
    pub const VISION: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        retry_transport: true,
        retry_server_errors: true,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(4),
        multiplier: 2.0,
    };

    /// A single attempt, no retries.
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        retry_transport: false,
        retry_server_errors: false,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 1.0,
    };

    /// Whether `err` on attempt number `attempt` (1-based) warrants another try.
    pub fn should_retry(&self, err: &ProviderError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        (self.retry_transport && err.is_transport())
            || (self.retry_server_errors && err.is_server_error())
    }

    /// Calculate the next backoff delay from the current one, clamped to
    /// [`max_delay`](Self::max_delay).
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }

    /// Override the backoff delays, keeping the retry classification.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Override the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Run `op` until it succeeds or `policy` says to stop.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if policy.should_retry(&err, attempt) => {
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying provider call",
                );
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
