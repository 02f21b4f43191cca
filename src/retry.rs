//! Bounded retry with a fixed delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default number of attempts.
pub const DEFAULT_ATTEMPTS: usize = 3;

/// Default pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Runs a fallible async operation up to `attempts` times.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    attempts: usize,
    delay: Duration,
}

impl Retry {
    /// `attempts` is clamped to at least one.
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// The last error is returned. Cancellation during a pause stops the
    /// loop early with the error of the attempt just made.
    pub async fn run<F, Fut, T, E>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    warn!(attempt, max = self.attempts, "attempt failed: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.delay) => {}
                        _ = cancel.cancelled() => return Err(e),
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_DELAY)
    }
}
