//! Bounded retry with exponential backoff
//!
//! Wraps generation calls that signal failure as data-absence. Causes are
//! not distinguished: every None is retried until attempts run out. The
//! policy is configured per call site, and sleeping goes through a trait so
//! tests run without wall-clock delays.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Seam for the inter-attempt delay
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately; backoff becomes a no-op. Used in tests
/// that drive the retry loop without wall-clock delays.
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Retry policy: attempt count plus backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy with the standard 1 second backoff base
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
        }
    }

    /// A single attempt, no backoff
    pub fn single_attempt() -> Self {
        Self::new(1)
    }

    /// Delay after failed attempt `attempt` (zero-based): base * 2^attempt
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Invoke `f` up to `max_attempts` times, stopping on the first Some.
    /// Sleeps between attempts but never after the last one. Returns None
    /// once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut f: F) -> Option<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Option<T>> + Send,
        T: Send,
    {
        for attempt in 0..self.max_attempts {
            if let Some(value) = f().await {
                return Some(value);
            }

            if attempt + 1 < self.max_attempts {
                let delay = self.backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    delay_secs = delay.as_secs(),
                    "Attempt failed, backing off"
                );
                sleeper.sleep(delay).await;
            }
        }

        None
    }
}
