//! Snapshot of item ids already present in the storage directory.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::fs::FileSystem;

/// Ids of items found in local storage at scan time.
///
/// Built once per run and read-only afterwards; downloads finished during the
/// run are not added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    ids: HashSet<u64>,
}

impl Inventory {
    /// Scans `dir` (one level, no recursion) for files named `<id>.<ext>`.
    ///
    /// Names that do not parse are skipped. A directory that does not exist
    /// yet yields an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for any failure other than the directory being absent.
    pub async fn scan<F: FileSystem + ?Sized>(fs: &F, dir: &Path) -> Result<Self> {
        let names = match fs.list_file_names(dir).await {
            Ok(names) => names,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Storage directory {} does not exist yet", dir.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let inventory: Self = names.iter().filter_map(|n| parse_item_id(n)).collect();
        log::info!(
            "Found {} existing item(s) in {}",
            inventory.len(),
            dir.display()
        );
        Ok(inventory)
    }

    /// Returns true if `id` was present at scan time.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Number of ids found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no ids were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u64> for Inventory {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Extracts the id from a `<id>.<ext>` file name.
///
/// Only the final extension is stripped, so `1.png.part` yields `None`.
#[must_use]
pub fn parse_item_id(name: &str) -> Option<u64> {
    let (stem, _ext) = name.rsplit_once('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::fs::TokioFileSystem;

    #[test]
    fn parse_item_id_cases() {
        assert_eq!(parse_item_id("5.png"), Some(5));
        assert_eq!(parse_item_id("1234567.webm"), Some(1_234_567));
        assert_eq!(parse_item_id("5."), Some(5));
        assert_eq!(parse_item_id("5"), None);
        assert_eq!(parse_item_id(".DS_Store"), None);
        assert_eq!(parse_item_id("5.png.part"), None);
        assert_eq!(parse_item_id("cover.jpg"), None);
        assert_eq!(parse_item_id("+5.png"), None);
        assert_eq!(parse_item_id("-5.png"), None);
        assert_eq!(parse_item_id("99999999999999999999999.png"), None);
    }

    #[tokio::test]
    async fn scan_collects_numeric_names() {
        let dir = TempDir::new().unwrap();
        for name in ["5.png", "12.webm", "notes.txt", ".hidden", "3.jpg.part"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("8.png")).unwrap();
        std::fs::write(dir.path().join("8.png").join("9.png"), b"x").unwrap();

        let inventory = Inventory::scan(&TokioFileSystem, dir.path()).await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert!(inventory.contains(5));
        assert!(inventory.contains(12));
        assert!(!inventory.contains(3));
        assert!(!inventory.contains(8));
        assert!(!inventory.contains(9));
    }

    #[tokio::test]
    async fn scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let inventory = Inventory::scan(&TokioFileSystem, &dir.path().join("later"))
            .await
            .unwrap();
        assert!(inventory.is_empty());
    }

    struct DeniedFileSystem;

    #[async_trait]
    impl FileSystem for DeniedFileSystem {
        async fn list_file_names(&self, _dir: &Path) -> std::io::Result<Vec<String>> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            ))
        }

        async fn create_dir_all(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }

        async fn create_file(&self, _path: &Path) -> std::io::Result<tokio::fs::File> {
            Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "mock"))
        }

        async fn rename_file(&self, _from: &Path, _to: &Path) -> std::io::Result<()> {
            Ok(())
        }

        async fn remove_file(&self, _path: &Path) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn scan_io_error_is_fatal() {
        let result = Inventory::scan(&DeniedFileSystem, Path::new("/favs")).await;
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
