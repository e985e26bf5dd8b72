//! Bounded retry with random backoff.
//!
//! Survey cutouts usually live on shared network storage that can be briefly
//! unavailable when many overlay jobs start at once. Opening inputs goes
//! through an explicit retry step that gives up after a fixed number of
//! attempts instead of spinning forever.

use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Retry policy for startup and input loading.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Upper bound of the uniformly random sleep between attempts
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            max_backoff: Duration::ZERO,
        }
    }

    fn backoff<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_backoff.is_zero() {
            return Duration::ZERO;
        }
        self.max_backoff.mul_f64(rng.gen::<f64>())
    }
}

/// Run `operation` until it succeeds or the policy's attempts are exhausted.
///
/// The error of the final attempt is returned with the attempt count attached.
pub fn retry_with_backoff<T, F>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut rng = rand::thread_rng();
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.backoff(&mut rng);
                warn!(
                    "{} failed (attempt {}/{}): {:#}; retrying in {:.1}s",
                    what,
                    attempt,
                    attempts,
                    e,
                    delay.as_secs_f64()
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("{} failed after {} attempts", what, attempts));
            }
        }
    }
}
