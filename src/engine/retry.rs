//! Exponential backoff for optimistic commits.
//!
//! An engine operation reads a versioned snapshot, decides, and commits
//! against that version. When another writer got there first the store
//! reports a conflict and the whole operation is run again from a fresh
//! snapshot. Rejections and every other error are returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::EngineError;

/// Configuration for conflict retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay after the first conflict.
    pub initial_delay: Duration,

    /// Maximum delay between attempts (cap for exponential growth).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 5 attempts with 10ms, 20ms, 40ms and 80ms between them.
    pub const DEFAULT: Self = Self {
        max_attempts: 5,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(200),
        backoff_multiplier: 2.0,
    };

    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// The default backoff with a different attempt budget. Zero is treated
    /// as one.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::DEFAULT
        }
    }

    /// Computes the delay after the given failed attempt (0-indexed).
    ///
    /// The delay grows exponentially: `initial_delay * backoff_multiplier^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns an iterator over the delays between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|attempt| self.delay_for_attempt(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation` until it succeeds, fails with anything but a conflict, or
/// the attempt budget runs out.
///
/// On exhaustion the last conflict is returned; it surfaces to callers as a
/// storage failure.
pub async fn retry_on_conflict<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Err(e) if e.is_conflict() => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Conflict retries exhausted"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Write conflict, retrying from a fresh snapshot"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
