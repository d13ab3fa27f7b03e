//! Top-level run: scan, paginate, deduplicate, download, report.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::dedup;
use crate::download::{DownloadProgress, Downloader, Failure, NoProgress};
use crate::error::{Error, Result};
use crate::fetcher::{HttpFetcher, build_http_client};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::inventory::Inventory;
use crate::listing::{ListingClient, ListingPage};
use crate::paginate::{PageSink, Paginator};
use crate::rate_limit::RateLimiter;
use crate::stats::{SessionStats, SessionStatsBuilder};

/// Outcome of a run. Produced on every exit path.
#[derive(Debug)]
pub struct RunReport {
    /// Counts for the whole run.
    pub stats: SessionStats,
    /// Downloads that failed, with their errors.
    pub failures: Vec<Failure>,
    /// Why the run stopped early, if it did.
    pub error: Option<Error>,
}

impl RunReport {
    fn aborted(stats: SessionStats, error: Error) -> Self {
        Self {
            stats,
            failures: Vec::new(),
            error: Some(error),
        }
    }

    /// Returns true if the listing was exhausted and every download succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.stats.is_clean()
    }

    /// Returns true if the run stopped because it was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_cancelled)
    }
}

/// Filters each page against the inventory and dispatches what is left.
struct DispatchSink<'a, F: FileSystem + 'static> {
    inventory: &'a Inventory,
    downloader: Downloader<F>,
    stats: &'a mut SessionStatsBuilder,
    progress: &'a Arc<dyn DownloadProgress>,
}

#[async_trait]
impl<F: FileSystem + 'static> PageSink for DispatchSink<'_, F> {
    async fn accept(&mut self, index: u32, page: ListingPage, token: &CancellationToken) -> Result<()> {
        let listed = page.len();
        let filtered = dedup::filter(page, self.inventory);
        self.stats.add_page(filtered.skipped);
        self.progress.on_page(index, listed, filtered.skipped);

        let spawned = self.downloader.dispatch(filtered.page, token).await?;
        log::debug!(
            "Page {index}: {listed} listed, {} already present, {spawned} dispatched",
            filtered.skipped
        );
        Ok(())
    }
}

/// Downloads one user's favorites into their storage directory.
pub struct Pipeline<F: FileSystem + Clone + 'static = TokioFileSystem> {
    config: AppConfig,
    client: reqwest::Client,
    fs: F,
    progress: Arc<dyn DownloadProgress>,
}

impl Pipeline<TokioFileSystem> {
    /// Creates a pipeline using the default file system.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_fs(config, TokioFileSystem)
    }
}

impl<F: FileSystem + Clone + 'static> Pipeline<F> {
    /// Creates a pipeline with a custom file system implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn with_fs(config: AppConfig, fs: F) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(&config.download)?;
        Ok(Self {
            config,
            client,
            fs,
            progress: Arc::new(NoProgress),
        })
    }

    /// Sets the progress receiver.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs to completion, cancellation, or the first listing failure.
    ///
    /// Downloads already dispatched are always awaited before returning, so
    /// every file reported as downloaded exists on disk.
    pub async fn run(&self, token: &CancellationToken) -> RunReport {
        let mut builder = SessionStatsBuilder::new();
        let profile = &self.config.profile;
        let download = &self.config.download;

        let inventory = match Inventory::scan(&self.fs, &profile.storage_path).await {
            Ok(inventory) => inventory,
            Err(e) => {
                log::error!("Could not scan {}: {e}", profile.storage_path.display());
                return RunReport::aborted(builder.build(), e);
            }
        };

        let limiter = Arc::new(RateLimiter::new(download.rate_interval()));
        let fetcher = HttpFetcher::new(self.client.clone(), limiter, download.retry.clone());
        let listing = match ListingClient::new(fetcher.clone(), &download.listing_url) {
            Ok(listing) => listing,
            Err(e) => return RunReport::aborted(builder.build(), e),
        };

        let downloader = Downloader::with_fs(
            fetcher,
            &profile.storage_path,
            download,
            Arc::clone(&self.progress),
            self.fs.clone(),
        );
        let paginator = Paginator::new(listing, download.page_size, download.first_page);

        let mut sink = DispatchSink {
            inventory: &inventory,
            downloader,
            stats: &mut builder,
            progress: &self.progress,
        };
        let outcome = paginator.run(&profile.tag_filter(), &mut sink, token).await;

        let in_flight = sink.downloader.in_flight();
        if in_flight > 0 {
            log::info!("Waiting for {in_flight} download(s) to finish");
        }
        let report = sink.downloader.finish().await;

        builder.add_failed(report.failed.len());
        builder.add_cancelled(report.cancelled);
        builder.add_missing(report.missing.ids());
        for file in &report.completed {
            builder.add_download(file);
        }
        let stats = builder.build();

        let error = match outcome {
            Ok(pages) => {
                log::info!("Listing exhausted after {pages} page(s)");
                None
            }
            Err(Error::Cancelled) => {
                log::warn!("Run cancelled");
                Some(Error::Cancelled)
            }
            Err(e) => {
                log::error!("Listing stopped: {e}");
                Some(e)
            }
        };

        log::info!(
            "Done: {} downloaded, {} skipped, {} missing URL, {} failed",
            stats.files_downloaded,
            stats.files_skipped,
            stats.missing_urls.len(),
            stats.files_failed
        );

        RunReport {
            stats,
            failures: report.failed,
            error,
        }
    }
}
