//! Bounded retry with exponential backoff
//!
//! Only transport failures are retried. A malformed reply is returned to
//! the caller on the first occurrence.

use std::time::Duration;
use tct_core::{CompletionRequest, LlmClient, LlmConfig, Result};
use tracing::warn;

/// Retry schedule for a single model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay after the first failure
    pub initial_delay: Duration,

    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.retry_initial_secs),
            Duration::from_secs(config.retry_max_secs),
        )
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Run `request` against `client`, retrying transport failures
pub async fn complete_with_retry<C>(
    client: &C,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String>
where
    C: LlmClient + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match client.complete(request).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = %request.operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Model call failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
