use crate::config::RateLimitConfig;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded: no permit available within {0:?}")]
    Exceeded(Duration),
    #[error("Cancelled while waiting for a permit")]
    Cancelled,
}

struct Window {
    permits: u32,
    resets_at: Instant,
}

/// A fixed-window permit limiter shared by every billing worker.
///
/// Each window of `refresh_period` hands out at most `limit_for_period`
/// permits. Callers that find the window exhausted sleep until the next one
/// opens, unless that lies beyond their timeout, in which case they fail
/// straight away.
pub struct RateLimiter {
    limit_for_period: u32,
    refresh_period: Duration,
    timeout: Duration,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Creates a limiter whose first window opens now.
    ///
    /// # Arguments
    ///
    /// * `limit_for_period` - Permits handed out per window.
    /// * `refresh_period` - Length of one window.
    /// * `timeout` - Longest a caller may wait for a permit.
    pub fn new(limit_for_period: u32, refresh_period: Duration, timeout: Duration) -> Self {
        Self {
            limit_for_period,
            refresh_period,
            timeout,
            window: Mutex::new(Window {
                permits: limit_for_period,
                resets_at: Instant::now() + refresh_period,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.limit_for_period,
            config.refresh_period(),
            config.timeout(),
        )
    }

    /// Takes one permit, waiting for the next window if needed.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let next_window = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                if now >= window.resets_at {
                    window.permits = self.limit_for_period;
                    window.resets_at = now + self.refresh_period;
                }
                if window.permits > 0 {
                    window.permits -= 1;
                    return Ok(());
                }
                window.resets_at
            };

            if next_window > deadline {
                tracing::debug!(timeout = ?self.timeout, "No permit available before timeout");
                return Err(RateLimitError::Exceeded(self.timeout));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = sleep_until(next_window) => {}
            }
        }
    }

    /// Permits left in the current window.
    pub async fn available_permits(&self) -> u32 {
        let window = self.window.lock().await;
        if Instant::now() >= window.resets_at {
            self.limit_for_period
        } else {
            window.permits
        }
    }
}
