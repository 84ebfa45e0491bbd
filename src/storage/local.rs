//! Local filesystem storage implementation.
//!
//! Every key maps to a file under the root directory, with `/` in the key
//! becoming a directory separator.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── comics/
//! │   ├── 1
//! │   └── 2
//! ├── images/
//! │   └── 1
//! └── state/
//!     └── last-scraped
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{KvStore, ListPage};

const DEFAULT_PAGE_SIZE: usize = 1000;
const TMP_SUFFIX: &str = ".tmp";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    page_size: usize,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_page_size(root_dir, DEFAULT_PAGE_SIZE)
    }

    /// Create a LocalStorage that returns at most `page_size` keys per listing.
    pub fn with_page_size(root_dir: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root_dir: root_dir.into(),
            page_size: page_size.max(1),
        }
    }

    /// Get the full path for a key, rejecting keys that escape the root.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.ends_with(TMP_SUFFIX)
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !valid {
            return Err(AppError::validation(format!("invalid storage key '{key}'")));
        }
        Ok(self.root_dir.join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Collect every key stored below the directory that holds `prefix`.
    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = match prefix.rfind('/') {
            Some(idx) => self.root_dir.join(&prefix[..idx]),
            None => self.root_dir.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if key.starts_with(prefix) && !key.ends_with(TMP_SUFFIX) {
                    keys.push(key);
                }
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_dir).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments?.join("/"))
    }
}

#[async_trait]
impl KvStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        self.ensure_dir(&path).await?;

        // Unique per write so concurrent puts to one key never share a temp file
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".{}.{}{}", std::process::id(), seq, TMP_SUFFIX));
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(value).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage> {
        let keys = self.keys_under(prefix).await?;
        let start = match cursor {
            Some(after) => keys.partition_point(|key| key.as_str() <= after),
            None => 0,
        };

        let remaining = &keys[start..];
        let complete = remaining.len() <= self.page_size;
        let page: Vec<String> = remaining.iter().take(self.page_size).cloned().collect();
        let cursor = if complete { None } else { page.last().cloned() };

        Ok(ListPage {
            keys: page,
            cursor,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.put("comics/1", b"hello").await.unwrap();
        let data = storage.get("comics/1").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(tmp.path().join("comics/1").exists());
        assert!(!tmp.path().join("comics/1.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.get("comics/404").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.put("../outside", b"x").await.is_err());
        assert!(storage.put("comics//1", b"x").await.is_err());
        assert!(storage.get("").await.is_err());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::with_page_size(tmp.path(), 2);
        for key in ["comics/1", "comics/10", "comics/2", "images/1", "state/last-scraped"] {
            storage.put(key, b"x").await.unwrap();
        }

        let first = storage.list("comics/", None).await.unwrap();
        assert_eq!(first.keys, vec!["comics/1", "comics/10"]);
        assert!(!first.complete);

        let second = storage
            .list("comics/", first.cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["comics/2"]);
        assert!(second.complete);
    }

    #[tokio::test]
    async fn test_list_missing_namespace() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let page = storage.list("comics/", None).await.unwrap();
        assert!(page.keys.is_empty());
        assert!(page.complete);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_to_one_key() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        for round in 0..20u32 {
            let writers: Vec<_> = (0..8u32)
                .map(|writer| {
                    let storage = storage.clone();
                    tokio::spawn(async move {
                        let value = format!("{}", round * 8 + writer);
                        storage.put("state/last-scraped", value.as_bytes()).await
                    })
                })
                .collect();

            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let stored = storage.get("state/last-scraped").await.unwrap().unwrap();
            let value: u32 = String::from_utf8(stored).unwrap().parse().unwrap();
            assert!((round * 8..round * 8 + 8).contains(&value));
        }

        let page = storage.list("state/", None).await.unwrap();
        assert_eq!(page.keys, vec!["state/last-scraped"]);
    }
}
