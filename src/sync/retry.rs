//! Bounded in-pass retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::provider::ProviderResult;

/// How often a single provider call is attempted.
///
/// Only [`crate::provider::ProviderError::Transient`] failures are retried.
/// The default makes exactly one attempt, so anything left failing is picked
/// up again on the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for the doubled delays
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    /// Run `operation` until it succeeds, fails non-transiently or the
    /// attempts are used up. Returns the last error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        what, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2).min(self.max_delay);
                }
            }
        }
    }
}
