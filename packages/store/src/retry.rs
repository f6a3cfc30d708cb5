//! Bounded polling for read-after-write lag.

use std::future::Future;
use std::time::Duration;

/// How many times, and how far apart, to re-read a record that was just
/// written but is not yet visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it yields `Some`, an error, or the attempts run out.
    ///
    /// Errors are returned immediately; only absence is retried.
    pub async fn until_some<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(found) = op().await? {
                return Ok(Some(found));
            }
            if attempt < attempts {
                tracing::debug!(what, attempt, "not visible yet; retrying");
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(None)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50))
    }
}
