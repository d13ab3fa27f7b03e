//! Fixed-interval rate limiting shared by every outbound request.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Issues one permit per interval, first come first served.
///
/// Waiters queue on a fair mutex, so grants are strictly serialized and no
/// caller can be granted a permit sooner than `interval` after the previous
/// one. The first permit is granted immediately.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter spacing grants by `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_grant: Mutex::new(None),
        }
    }

    /// Returns the configured spacing between grants.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for a permit and returns the instant it was granted.
    pub async fn acquire(&self) -> Instant {
        let mut next = self.next_grant.lock().await;
        if let Some(at) = *next {
            sleep_until(at).await;
        }
        let granted = Instant::now();
        *next = Some(granted + self.interval);
        granted
    }

    /// Like [`acquire`](Self::acquire), but gives up when `token` is cancelled.
    ///
    /// A cancelled wait does not consume a permit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fires before a permit is granted.
    pub async fn acquire_cancellable(&self, token: &CancellationToken) -> Result<Instant> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            granted = self.acquire() => Ok(granted),
        }
    }
}
