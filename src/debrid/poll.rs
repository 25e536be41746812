//! Bounded fixed-delay polling
//!
//! Used while a provider is still resolving torrent metadata after a magnet
//! has been added. The delay is constant between attempts; there is no backoff.

use std::future::Future;
use std::time::Duration;

use super::error::Result;

/// Default number of listing attempts
pub const DEFAULT_POLL_ATTEMPTS: u32 = 5;

/// Default delay between attempts
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// Maximum attempts and fixed spacing for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Run `attempt` until it yields `Some`, an error, or the budget runs out.
    ///
    /// Errors from an attempt abort the loop. `Ok(None)` means every attempt
    /// came back empty. No sleep follows the final attempt.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<Option<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for n in 1..=self.max_attempts {
            if let Some(value) = attempt(n).await? {
                return Ok(Some(value));
            }

            tracing::debug!(attempt = n, max = self.max_attempts, "poll attempt came back empty");

            if n < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(None)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_DELAY)
    }
}
