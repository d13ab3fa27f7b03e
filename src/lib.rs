//! fav-dl - A library for mirroring a user's favorites from a paginated media API.
//!
//! The listing is walked page by page through a shared rate limiter. Items
//! already present in the storage directory are skipped, the rest are
//! downloaded concurrently, each written to a `.part` file and renamed once
//! complete.
//!
//! # Example
//!
//! ```no_run
//! use fav_dl::{AppConfig, Pipeline, Profile};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> fav_dl::Result<()> {
//! let config = AppConfig {
//!     profile: Profile::new("someone", "./favorites"),
//!     ..AppConfig::default()
//! };
//!
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline.run(&CancellationToken::new()).await;
//! println!("Downloaded {} files", report.stats.files_downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod fs;
pub mod inventory;
pub mod listing;
pub mod paginate;
pub mod pipeline;
pub mod rate_limit;
pub mod stats;

#[cfg(test)]
mod test_helpers;

// Re-export main types for convenience
pub use config::{AppConfig, DownloadConfig, Profile, RetryPolicy};
pub use dedup::{Filtered, filter};
pub use download::{
    DownloadProgress, DownloadReport, Downloader, Failure, MissingUrlRegistry, NoProgress,
    PendingDownload,
};
pub use error::{Error, Result};
pub use fetcher::{HttpFetcher, build_http_client};
pub use fs::{FileSystem, TokioFileSystem};
pub use inventory::Inventory;
pub use listing::{Item, ListingClient, ListingPage, ListingSource};
pub use paginate::{PageSink, Paginator};
pub use pipeline::{Pipeline, RunReport};
pub use rate_limit::RateLimiter;
pub use stats::{FileStats, SessionStats};
