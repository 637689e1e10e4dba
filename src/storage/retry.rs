//! Retry schedule for transient storage failures.

use std::time::Duration;

/// Delays between consecutive attempts, in milliseconds.
const BACKOFF_TABLE_MS: [u64; 3] = [10, 20, 40];

/// Delay before retry number `attempt` (zero-based).
///
/// Attempts past the end of the table reuse its last entry.
pub fn backoff(attempt: usize) -> Duration {
    let idx = attempt.min(BACKOFF_TABLE_MS.len() - 1);
    Duration::from_millis(BACKOFF_TABLE_MS[idx])
}

/// How often, and how patiently, a storage operation is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub delay: fn(usize) -> Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: BACKOFF_TABLE_MS.len(),
            delay: backoff,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: |_| Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `is_transient` decides whether an error is worth another attempt.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut() -> Result<T, E>,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, E> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < self.max_attempts && is_transient(&e) => {
                    std::thread::sleep((self.delay)(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
