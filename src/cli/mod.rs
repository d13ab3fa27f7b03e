//! CLI mode for fav - command-line interface for downloading favorites.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::{AppConfig, DownloadProgress, Pipeline};

pub use progress::{CliProgress, print_summary};

/// Download every favorite of a user into a local directory.
#[derive(Debug, Parser)]
#[command(name = "fav", version, about)]
pub struct Args {
    /// Account whose favorites are downloaded.
    #[arg(short, long, env = "FAV_DL_USER")]
    pub user: Option<String>,

    /// Directory downloaded files are stored in.
    #[arg(short, long, env = "FAV_DL_DIR")]
    pub dir: Option<PathBuf>,

    /// Items requested per listing page.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Maximum number of simultaneous downloads.
    #[arg(short = 'j', long)]
    pub concurrent: Option<usize>,

    /// Listing endpoint.
    #[arg(long)]
    pub listing_url: Option<String>,

    /// Configuration file (defaults to the user config directory).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the resolved user and directory back to the configuration file.
    #[arg(long)]
    pub save: bool,
}

impl Args {
    /// Path of the configuration file to read and, with `--save`, write.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(AppConfig::default_path)
    }

    /// Overrides file settings with values given on the command line or environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(user) = &self.user {
            config.profile.username.clone_from(user);
        }
        if let Some(dir) = &self.dir {
            config.profile.storage_path.clone_from(dir);
        }
        if let Some(page_size) = self.page_size {
            config.download.page_size = page_size;
        }
        if let Some(concurrent) = self.concurrent {
            config.download.concurrent_files = concurrent;
        }
        if let Some(url) = &self.listing_url {
            config.download.listing_url.clone_from(url);
        }
        if config.profile.storage_path.as_os_str().is_empty() {
            config.profile.storage_path = PathBuf::from(".");
        }
    }
}

/// Resolves configuration from file and arguments.
///
/// # Errors
///
/// Returns an error if the configuration file is unreadable or the result is invalid.
pub fn resolve_config(args: &Args) -> crate::Result<AppConfig> {
    let path = args.config_path();
    let mut config = AppConfig::load(&path)?;
    args.apply(&mut config);
    config.validate()?;

    if args.save {
        config.save(&path)?;
        log::info!("Saved profile to {}", path.display());
    }
    Ok(config)
}

/// Runs the CLI download mode.
///
/// Returns `Ok(true)` if the listing was exhausted and every download succeeded.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or the pipeline cannot start.
pub async fn run() -> crate::Result<bool> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    println!(
        "Downloading favorites of {} into {}",
        config.profile.username,
        config.profile.storage_path.display()
    );

    let progress = Arc::new(CliProgress::new());
    let pipeline =
        Pipeline::new(config)?.with_progress(Arc::clone(&progress) as Arc<dyn DownloadProgress>);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received SIGINT, finishing up");
            signal_token.cancel();
        }
    });

    let report = pipeline.run(&token).await;
    progress.finish();
    print_summary(&report.stats, &report.failures);

    if let Some(error) = &report.error
        && !report.was_cancelled()
    {
        eprintln!("Run stopped early: {error}");
    }
    Ok(report.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn args_override_config() {
        let args = Args::parse_from([
            "fav",
            "--user",
            "wolf",
            "--dir",
            "/srv/favs",
            "--page-size",
            "50",
            "-j",
            "2",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.profile.username, "wolf");
        assert_eq!(config.profile.storage_path, PathBuf::from("/srv/favs"));
        assert_eq!(config.download.page_size, 50);
        assert_eq!(config.download.concurrent_files, 2);
    }

    #[test]
    fn storage_defaults_to_current_dir() {
        let args = Args::parse_from(["fav", "--user", "wolf"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.profile.storage_path, PathBuf::from("."));
    }

    #[test]
    fn resolve_saves_profile_when_asked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().into_owned();
        let args = Args::parse_from([
            "fav", "--user", "wolf", "--dir", "/srv/favs", "--config", &path_str, "--save",
        ]);

        resolve_config(&args).unwrap();

        let saved = AppConfig::load(&path).unwrap();
        assert_eq!(saved.profile.username, "wolf");
        assert_eq!(saved.profile.storage_path, PathBuf::from("/srv/favs"));
    }

    #[test]
    fn resolve_without_user_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().into_owned();
        let args = Args {
            user: None,
            dir: None,
            page_size: None,
            concurrent: None,
            listing_url: None,
            config: Some(PathBuf::from(&path_str)),
            save: false,
        };
        assert!(matches!(
            resolve_config(&args),
            Err(crate::Error::Config(_))
        ));
    }
}
