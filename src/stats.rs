//! Download statistics types.

use std::time::{Duration, Instant};

/// Statistics for a single file download.
#[derive(Debug, Clone)]
pub struct FileStats {
    /// Id of the downloaded item.
    pub id: u64,
    /// Bytes written to disk.
    pub size: u64,
    /// Time from first request to rename.
    pub elapsed: Duration,
}

impl FileStats {
    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.size as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Statistics for an entire run.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Listing pages fetched successfully.
    pub pages_fetched: u32,
    /// Number of files successfully downloaded.
    pub files_downloaded: usize,
    /// Number of listed items skipped because they already existed.
    pub files_skipped: usize,
    /// Number of downloads that failed.
    pub files_failed: usize,
    /// Number of downloads abandoned because the run was cancelled.
    pub files_cancelled: usize,
    /// Ids of listed items that had no source URL, in the order seen.
    pub missing_urls: Vec<u64>,
    /// Total bytes downloaded.
    pub total_bytes: u64,
    /// Total elapsed time for the run.
    pub elapsed: Duration,
}

impl SessionStats {
    /// Creates a new empty session stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Returns true if every dispatched download finished successfully.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.files_cancelled == 0
    }
}

/// Builder for accumulating session statistics during a run.
pub struct SessionStatsBuilder {
    stats: SessionStats,
    start_time: Instant,
}

impl Default for SessionStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsBuilder {
    /// Creates a new session stats builder, starting the run clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: SessionStats::new(),
            start_time: Instant::now(),
        }
    }

    /// Records a fetched listing page and how many of its items were already present.
    pub const fn add_page(&mut self, skipped: usize) {
        self.stats.pages_fetched += 1;
        self.stats.files_skipped += skipped;
    }

    /// Records a completed file download.
    pub const fn add_download(&mut self, file_stats: &FileStats) {
        self.stats.files_downloaded += 1;
        self.stats.total_bytes += file_stats.size;
    }

    /// Records failed downloads.
    pub const fn add_failed(&mut self, count: usize) {
        self.stats.files_failed += count;
    }

    /// Records downloads abandoned on cancellation.
    pub const fn add_cancelled(&mut self, count: usize) {
        self.stats.files_cancelled += count;
    }

    /// Records ids that had no source URL.
    pub fn add_missing(&mut self, ids: &[u64]) {
        self.stats.missing_urls.extend_from_slice(ids);
    }

    /// Builds the final session statistics.
    #[must_use]
    pub fn build(self) -> SessionStats {
        SessionStats {
            elapsed: self.start_time.elapsed(),
            ..self.stats
        }
    }
}
