use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed (optionally growing) pause between attempts.
///
/// Attempts never overlap: the next one starts only after the previous one
/// failed and the pause elapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    /// Multiplier applied to the pause after every failed attempt. 1.0 keeps it fixed.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 5_000,
            backoff: 1.0,
        }
    }
}

/// The error that ended a retried operation, with the number of attempts made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
    pub exhausted: bool,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
            backoff: 1.0,
        }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let ms = (self.delay_ms as f64 * factor).min(u64::MAX as f64);
        Duration::from_millis(ms as u64)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        label: &str,
        mut op: F,
        is_retryable: R,
    ) -> Result<(T, u32), RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok((v, attempt)),
                Err(e) => {
                    if !is_retryable(&e) {
                        return Err(RetryFailure {
                            attempts: attempt,
                            error: e,
                            exhausted: false,
                        });
                    }
                    if attempt >= max {
                        tracing::warn!(
                            event = "retry.exhausted",
                            op = label,
                            attempts = attempt,
                            error = %e,
                        );
                        return Err(RetryFailure {
                            attempts: attempt,
                            error: e,
                            exhausted: true,
                        });
                    }
                    let pause = self.delay_after(attempt);
                    tracing::warn!(
                        event = "retry.attempt_failed",
                        op = label,
                        attempt,
                        max_attempts = max,
                        pause_ms = pause.as_millis() as u64,
                        error = %e,
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
            }
        }
    }
}
