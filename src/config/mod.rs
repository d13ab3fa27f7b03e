//! Configuration types for listing and download operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default listing endpoint.
pub const DEFAULT_LISTING_URL: &str = "https://e621.net/posts.json";

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of requests issued before giving up, including the first.
    pub max_attempts: u32,
    /// Cooldown before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single cooldown, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 5_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Returns the cooldown to wait after the given failed attempt (1-indexed).
    ///
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Returns true if another attempt is allowed after `attempt` requests.
    #[must_use]
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Configuration for listing and download operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Listing endpoint queried for favorites.
    pub listing_url: String,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Index of the first page requested.
    pub first_page: u32,
    /// Number of downloads allowed to hold an open response at once.
    pub concurrent_files: usize,
    /// Minimum spacing between any two outbound requests, in milliseconds.
    pub rate_interval_ms: u64,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Whether to remove `.part` files when a download fails.
    pub cleanup_on_error: bool,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Retry behaviour for server errors and transport failures.
    pub retry: RetryPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            page_size: 320,
            first_page: 0,
            concurrent_files: 4,
            rate_interval_ms: 1010,
            request_timeout_secs: 60,
            cleanup_on_error: true,
            user_agent: concat!("fav-dl/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listing endpoint.
    #[must_use]
    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    /// Sets the number of items requested per page.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the index of the first page.
    #[must_use]
    pub const fn with_first_page(mut self, first_page: u32) -> Self {
        self.first_page = first_page;
        self
    }

    /// Sets the number of concurrent file downloads.
    #[must_use]
    pub const fn with_concurrent_files(mut self, concurrent: usize) -> Self {
        self.concurrent_files = concurrent;
        self
    }

    /// Sets the minimum spacing between requests.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_rate_interval(mut self, interval: Duration) -> Self {
        self.rate_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets whether to clean up `.part` files on download error.
    #[must_use]
    pub const fn with_cleanup_on_error(mut self, cleanup: bool) -> Self {
        self.cleanup_on_error = cleanup;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Minimum spacing between requests.
    #[must_use]
    pub const fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the values that would otherwise stall or break a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if self.concurrent_files == 0 {
            return Err(Error::Config("concurrent_files must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if reqwest::Url::parse(&self.listing_url).is_err() {
            return Err(Error::Config(format!(
                "listing_url is not a valid URL: {}",
                self.listing_url
            )));
        }
        Ok(())
    }
}

/// The user whose favorites are fetched and where they are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Account name whose favorites are listed.
    pub username: String,
    /// Directory holding downloaded files.
    pub storage_path: PathBuf,
}

impl Profile {
    /// Creates a profile for the given user and storage directory.
    #[must_use]
    pub fn new(username: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            storage_path: storage_path.into(),
        }
    }

    /// Tag filter selecting this user's favorites.
    #[must_use]
    pub fn tag_filter(&self) -> String {
        format!("fav:{}", self.username)
    }
}

/// Complete application configuration, persisted as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Resolved user and storage directory.
    pub profile: Profile,
    /// Download configuration.
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fav-dl")
            .join("config.toml")
    }

    /// Loads configuration from `path`, falling back to defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes configuration to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks that the configuration is complete enough to start a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the username is empty or a download setting is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.profile.username.trim().is_empty() {
            return Err(Error::Config("username is not set".into()));
        }
        self.download.validate()
    }
}
