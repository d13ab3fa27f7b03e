//! Concurrent download dispatch with atomic `.part` writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fetcher::HttpFetcher;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::listing::{Item, ListingPage};
use crate::stats::FileStats;

/// Trait for receiving progress updates during a run.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress: Send + Sync {
    /// Called after a listing page has been fetched and filtered.
    fn on_page(&self, _page: u32, _listed: usize, _skipped: usize) {}

    /// Called for each listed item that has no source URL.
    fn on_missing_url(&self, _id: u64) {}

    /// Called when a file starts streaming to disk.
    fn on_file_start(&self, _name: &str, _size: Option<u64>) {}

    /// Called when a file download completes successfully.
    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {}

    /// Called when a file download fails.
    fn on_error(&self, _name: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// One file to fetch, consumed by exactly one download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    /// Item id.
    pub id: u64,
    /// URL the body is fetched from.
    pub source_url: String,
    /// Final location, `<dir>/<id>.<ext>`.
    pub destination: PathBuf,
}

impl PendingDownload {
    /// Plans the download of `item` into `dir`.
    #[must_use]
    pub fn new(item: Item, dir: &Path) -> Self {
        Self {
            destination: dir.join(item.file_name()),
            id: item.id,
            source_url: item.source_url,
        }
    }

    /// Temporary path the body is streamed into before the rename.
    #[must_use]
    pub fn part_path(&self) -> PathBuf {
        let mut name = self.destination.clone().into_os_string();
        name.push(".part");
        PathBuf::from(name)
    }

    fn display_name(&self) -> String {
        self.destination
            .file_name()
            .map_or_else(|| self.id.to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Ids of listed items that had no source URL.
///
/// Append-only. Only the dispatching task writes to it, so no locking is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingUrlRegistry {
    ids: Vec<u64>,
}

impl MissingUrlRegistry {
    /// Records an id.
    pub fn record(&mut self, id: u64) {
        self.ids.push(id);
    }

    /// Recorded ids, in the order seen.
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Number of recorded ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A download that did not complete.
#[derive(Debug)]
pub struct Failure {
    /// Item id, `None` if the task died before reporting it.
    pub id: Option<u64>,
    /// What went wrong.
    pub error: Error,
}

/// Outcome of every download dispatched during a run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Successful downloads.
    pub completed: Vec<FileStats>,
    /// Failed downloads.
    pub failed: Vec<Failure>,
    /// Downloads abandoned because the run was cancelled.
    pub cancelled: usize,
    /// Items skipped for lack of a source URL.
    pub missing: MissingUrlRegistry,
}

impl DownloadReport {
    fn absorb(&mut self, joined: std::result::Result<(u64, Result<FileStats>), tokio::task::JoinError>) {
        match joined {
            Ok((_, Ok(stats))) => self.completed.push(stats),
            Ok((_, Err(Error::Cancelled))) => self.cancelled += 1,
            Ok((id, Err(error))) => self.failed.push(Failure {
                id: Some(id),
                error,
            }),
            Err(e) => {
                log::error!("Download task failed: {e}");
                self.failed.push(Failure {
                    id: None,
                    error: Error::Task(e),
                });
            }
        }
    }
}

struct Shared<F> {
    fetcher: HttpFetcher,
    fs: F,
    progress: Arc<dyn DownloadProgress>,
    cleanup_on_error: bool,
}

/// Dispatches one background task per downloadable item.
///
/// [`dispatch`](Self::dispatch) returns as soon as a page's tasks are
/// spawned; [`finish`](Self::finish) waits for all of them.
pub struct Downloader<F: FileSystem + 'static = TokioFileSystem> {
    shared: Arc<Shared<F>>,
    destination_dir: PathBuf,
    slots: Arc<Semaphore>,
    tasks: JoinSet<(u64, Result<FileStats>)>,
    report: DownloadReport,
    dir_ready: bool,
}

impl Downloader<TokioFileSystem> {
    /// Creates a downloader writing into `destination_dir` with the default file system.
    #[must_use]
    pub fn new(
        fetcher: HttpFetcher,
        destination_dir: impl Into<PathBuf>,
        config: &DownloadConfig,
        progress: Arc<dyn DownloadProgress>,
    ) -> Self {
        Self::with_fs(fetcher, destination_dir, config, progress, TokioFileSystem)
    }
}

impl<F: FileSystem + 'static> Downloader<F> {
    /// Creates a downloader with a custom file system implementation.
    #[must_use]
    pub fn with_fs(
        fetcher: HttpFetcher,
        destination_dir: impl Into<PathBuf>,
        config: &DownloadConfig,
        progress: Arc<dyn DownloadProgress>,
        fs: F,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                fs,
                progress,
                cleanup_on_error: config.cleanup_on_error,
            }),
            destination_dir: destination_dir.into(),
            slots: Arc::new(Semaphore::new(config.concurrent_files.max(1))),
            tasks: JoinSet::new(),
            report: DownloadReport::default(),
            dir_ready: false,
        }
    }

    /// Ids recorded so far as lacking a source URL.
    #[must_use]
    pub const fn missing(&self) -> &MissingUrlRegistry {
        &self.report.missing
    }

    /// Number of dispatched downloads not yet collected.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Spawns a download task for every item in `page` that has a source URL.
    ///
    /// Items without one are recorded in the missing-URL registry instead.
    /// Items whose extension is not a plain alphanumeric suffix are recorded
    /// as failed without a request.
    /// Returns the number of tasks spawned.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination directory cannot be created.
    pub async fn dispatch(&mut self, page: ListingPage, token: &CancellationToken) -> Result<usize> {
        self.reap_finished();

        if !self.dir_ready && page.iter().any(Item::has_source) {
            self.shared.fs.create_dir_all(&self.destination_dir).await?;
            self.dir_ready = true;
        }

        let mut spawned = 0;
        for item in page {
            if !item.has_source() {
                log::warn!("{} has no source URL, skipping", item.id);
                self.shared.progress.on_missing_url(item.id);
                self.report.missing.record(item.id);
                continue;
            }
            if !item.has_safe_extension() {
                let error = Error::UnsafeExtension {
                    id: item.id,
                    extension: item.extension,
                };
                log::error!("Refusing to download: {error}");
                self.shared.progress.on_error(&item.id.to_string(), &error.to_string());
                self.report.failed.push(Failure {
                    id: Some(item.id),
                    error,
                });
                continue;
            }

            let pending = PendingDownload::new(item, &self.destination_dir);
            let shared = Arc::clone(&self.shared);
            let slots = Arc::clone(&self.slots);
            let token = token.clone();
            self.tasks.spawn(async move {
                let id = pending.id;
                let result = run_download(&shared, slots, &pending, &token).await;
                (id, result)
            });
            spawned += 1;
        }
        Ok(spawned)
    }

    /// Waits for every dispatched download and returns the combined report.
    pub async fn finish(mut self) -> DownloadReport {
        while let Some(joined) = self.tasks.join_next().await {
            self.report.absorb(joined);
        }
        self.report
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.report.absorb(joined);
        }
    }
}

async fn run_download<F: FileSystem>(
    shared: &Shared<F>,
    slots: Arc<Semaphore>,
    pending: &PendingDownload,
    token: &CancellationToken,
) -> Result<FileStats> {
    let _slot = tokio::select! {
        biased;
        () = token.cancelled() => return Err(Error::Cancelled),
        slot = slots.acquire_owned() => slot.map_err(|_| Error::Cancelled)?,
    };

    let name = pending.display_name();
    let result = download_file(shared, pending, &name, token).await;
    match &result {
        Ok(stats) => {
            log::debug!("Downloaded {name} ({} bytes)", stats.size);
            shared.progress.on_file_complete(&name, stats);
        }
        Err(Error::Cancelled) => {}
        Err(e) => {
            log::error!("Download of {} failed: {e}", pending.source_url);
            shared.progress.on_error(&name, &e.to_string());
        }
    }
    result
}

/// Downloads a single file using atomic `.part` file semantics.
///
/// Writes to `{path}.part` during download, then renames to `{path}` on success.
/// On error, cleans up the `.part` file if `cleanup_on_error` is enabled.
async fn download_file<F: FileSystem>(
    shared: &Shared<F>,
    pending: &PendingDownload,
    name: &str,
    token: &CancellationToken,
) -> Result<FileStats> {
    let start = Instant::now();
    let response = shared.fetcher.fetch(&pending.source_url, token).await?;
    let expected = response.content_length();

    log::info!("{} -> {}", pending.source_url, pending.destination.display());
    shared.progress.on_file_start(name, expected);

    let part = pending.part_path();
    let mut file = shared.fs.create_file(&part).await?;

    let written = write_body(response, &mut file, token)
        .await
        .and_then(|written| verify_length(expected, written).map(|()| written));
    drop(file);

    let finished = match written {
        Ok(size) => shared
            .fs
            .rename_file(&part, &pending.destination)
            .await
            .map(|()| size)
            .map_err(Error::from),
        Err(e) => Err(e),
    };

    match finished {
        Ok(size) => Ok(FileStats {
            id: pending.id,
            size,
            elapsed: start.elapsed(),
        }),
        Err(e) => {
            if shared.cleanup_on_error {
                let _ = shared.fs.remove_file(&part).await;
            }
            Err(e)
        }
    }
}

async fn write_body(
    response: reqwest::Response,
    file: &mut tokio::fs::File,
    token: &CancellationToken,
) -> Result<u64> {
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    loop {
        let chunk: Option<reqwest::Result<Bytes>> = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// A body shorter or longer than the advertised `Content-Length` is not kept.
fn verify_length(expected: Option<u64>, actual: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(Error::Truncated { expected, actual }),
        _ => Ok(()),
    }
}
