use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why a retried operation gave up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final one.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    /// The operation failed with an error the predicate refused to retry.
    #[error("{0}")]
    Permanent(E),
    /// Cancelled during backoff; `last` is the error that triggered it.
    #[error("Cancelled after {attempts} attempts: {last}")]
    Cancelled { attempts: u32, last: E },
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy making at most `max_attempts` attempts (at least one),
    /// sleeping `backoff` between them.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `operation` until it succeeds, fails with an error for which
    /// `is_retryable` is false, or runs out of attempts.
    pub async fn execute<T, E, F, Fut, P>(
        &self,
        cancel: &CancellationToken,
        is_retryable: P,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            let err = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !is_retryable(&err) {
                return Err(RetryError::Permanent(err));
            }
            if attempt >= self.max_attempts {
                warn!(attempt, error = %err, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            warn!(
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                retry_in_ms = self.backoff.as_millis() as u64,
                "Transient failure, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt, last: err });
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
            attempt += 1;
        }
    }
}
