//! Error types for the fav-dl library.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while listing or downloading favorites.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connection refused, timeout, reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status that is not worth retrying.
    #[error("HTTP {status} when getting {url}")]
    Status {
        /// Status code returned by the server.
        status: StatusCode,
        /// Requested URL.
        url: String,
    },

    /// The retry budget ran out on a server error or transport failure.
    #[error("giving up on {url} after {attempts} attempt(s){}", status_suffix(.last_status))]
    RetriesExhausted {
        /// Requested URL.
        url: String,
        /// Number of requests issued.
        attempts: u32,
        /// Status of the final attempt, `None` if it failed at the transport level.
        last_status: Option<StatusCode>,
    },

    /// A listing page body was not valid JSON for the expected shape.
    #[error("malformed listing page {page}: {source}")]
    Decode {
        /// Index of the page that failed to decode.
        page: u32,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response body ended before the advertised length.
    #[error("truncated download: expected {expected} bytes, got {actual}")]
    Truncated {
        /// `Content-Length` advertised by the server.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// A listed item's extension cannot be used in a local file name.
    #[error("item {id} has an unusable file extension {extension:?}")]
    UnsafeExtension {
        /// Item id.
        id: u64,
        /// Extension as listed.
        extension: String,
    },

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// A spawned download task panicked or was aborted.
    #[error("download task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The run was cancelled before the operation completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if the error was caused by cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<StatusCode>) -> String {
    status.map(|s| format!(" (last status {s})")).unwrap_or_default()
}

/// A specialized `Result` type for fav-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
