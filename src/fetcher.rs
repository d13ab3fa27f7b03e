//! Rate-limited HTTP GET with bounded retry on server errors.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{DownloadConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::rate_limit::RateLimiter;

/// Builds a configured HTTP client for listing and file requests.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client(config: &DownloadConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(config.request_timeout())
        .read_timeout(config.request_timeout())
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// Issues GET requests through a shared [`RateLimiter`].
///
/// Every request, retries included, consumes one permit. Server errors (5xx)
/// and transient transport failures are retried with the configured backoff;
/// any other non-success status is returned immediately as [`Error::Status`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher sharing `limiter` with every other fetcher built from it.
    #[must_use]
    pub const fn new(client: reqwest::Client, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            retry,
        }
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches `url`, returning the response once its status is a success.
    ///
    /// The caller owns the response body and reads it as a stream.
    ///
    /// # Errors
    ///
    /// - [`Error::Status`] for 4xx and other non-retryable statuses.
    /// - [`Error::RetriesExhausted`] when the retry budget runs out.
    /// - [`Error::Http`] for transport failures that are not worth retrying.
    /// - [`Error::Cancelled`] if `token` fires while waiting or requesting.
    pub async fn fetch(&self, url: &str, token: &CancellationToken) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.acquire_cancellable(token).await?;

            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => return Err(Error::Cancelled),
                res = self.client.get(url).send() => res,
            };

            let last_status = match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() => {
                    log::warn!("HTTP {} when getting {url}", response.status());
                    Some(response.status())
                }
                Ok(response) => {
                    return Err(Error::Status {
                        status: response.status(),
                        url: url.to_string(),
                    });
                }
                Err(e) if is_transient(&e) => {
                    log::warn!("Request to {url} failed: {e}");
                    None
                }
                Err(e) => return Err(Error::Http(e)),
            };

            if !self.retry.allows_retry(attempt) {
                return Err(Error::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_status,
                });
            }

            let delay = self.retry.delay_for(attempt);
            log::warn!(
                "Retrying {url} in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt + 1,
                self.retry.max_attempts
            );
            tokio::select! {
                () = token.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Connection and timeout failures may clear up on their own.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}
