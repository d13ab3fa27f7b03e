//! Progress display and summary reporting for CLI runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use console::style;
use indicatif::{HumanBytes, HumanDuration, MultiProgress, ProgressBar, ProgressStyle};

use crate::download::{DownloadProgress, Failure};
use crate::stats::{FileStats, SessionStats};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Terminal progress: one status spinner plus a line per finished file.
pub struct CliProgress {
    multi: MultiProgress,
    status: ProgressBar,
    page: AtomicUsize,
    done: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliProgress {
    /// Creates the progress display.
    #[must_use]
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("progress template is valid"),
        );
        status.enable_steady_tick(Duration::from_millis(120));
        status.set_message("Scanning storage...");
        Self {
            multi,
            status,
            page: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    /// Stops the spinner.
    pub fn finish(&self) {
        self.status.finish_and_clear();
    }

    fn refresh(&self) {
        self.status.set_message(format!(
            "page {} | {} downloaded | {} skipped | {} failed",
            self.page.load(Ordering::Relaxed),
            self.done.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        ));
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadProgress for CliProgress {
    fn on_page(&self, page: u32, _listed: usize, skipped: usize) {
        self.page.store(page as usize, Ordering::Relaxed);
        self.skipped.fetch_add(skipped, Ordering::Relaxed);
        self.refresh();
    }

    fn on_missing_url(&self, id: u64) {
        let _ = self
            .multi
            .println(format!("  {} {id} (no source URL)", style("?").yellow()));
    }

    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        self.done.fetch_add(1, Ordering::Relaxed);
        let _ = self.multi.println(format!(
            "  {} {name} - {} in {}",
            style("✓").green(),
            HumanBytes(stats.size),
            HumanDuration(stats.elapsed),
        ));
        self.refresh();
    }

    fn on_error(&self, name: &str, error: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .multi
            .println(format!("  {} {name}: {error}", style("✗").red()));
        self.refresh();
    }
}

/// Prints a summary of the run.
pub fn print_summary(stats: &SessionStats, failures: &[Failure]) {
    println!("\n{SEPARATOR}");
    println!("Summary");
    println!("{SEPARATOR}");
    println!("  Pages fetched:     {}", stats.pages_fetched);
    println!("  Files downloaded:  {}", stats.files_downloaded);
    if stats.files_downloaded > 0 {
        println!("  Total size:        {}", HumanBytes(stats.total_bytes));
        println!("  Average speed:     {}/s", HumanBytes(stats.average_speed()));
    }
    println!("  Already present:   {}", stats.files_skipped);
    println!("  Missing URL:       {}", stats.missing_urls.len());
    println!("  Failed:            {}", stats.files_failed);
    if stats.files_cancelled > 0 {
        println!("  Cancelled:         {}", stats.files_cancelled);
    }
    println!("  Total time:        {}", HumanDuration(stats.elapsed));

    if !stats.missing_urls.is_empty() {
        let ids: Vec<String> = stats.missing_urls.iter().map(u64::to_string).collect();
        println!("{SEPARATOR}");
        println!("No source URL: {}", ids.join(", "));
    }

    if !failures.is_empty() {
        println!("{SEPARATOR}");
        println!("Failures:");
        for failure in failures {
            match failure.id {
                Some(id) => println!("  {id}: {}", failure.error),
                None => println!("  (unknown): {}", failure.error),
            }
        }
    }
    println!("{SEPARATOR}");
}
