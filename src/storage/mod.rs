//! Storage abstractions for ingested comics.
//!
//! Everything is persisted in a flat key-value namespace:
//!
//! ```text
//! comics/{num}          # ComicRecord (JSON)
//! images/{num}          # ImageBlob envelope (JSON, base64 body)
//! state/last-scraped    # Scrape cursor (decimal)
//! ```
//!
//! Backends only need keyed get/put and a paginated prefix listing.
//! [`ComicStore`] layers the typed layout on top of any [`KvStore`].

mod drain;
pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ComicRecord, ImageBlob};

// Re-export for convenience
pub use drain::KeyDrain;
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in ascending order
    pub keys: Vec<String>,
    /// Token for the following page, present while the listing is incomplete
    pub cursor: Option<String>,
    /// Whether this page is the last one
    pub complete: bool,
}

/// Trait for key-value storage backends.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value, returning `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// List keys under `prefix`, starting after `cursor`.
    async fn list(&self, prefix: &str, cursor: Option<&str>) -> Result<ListPage>;
}

/// Key layout shared by every component.
pub mod keys {
    pub const COMIC_PREFIX: &str = "comics/";
    pub const IMAGE_PREFIX: &str = "images/";
    pub const CURSOR: &str = "state/last-scraped";

    pub fn comic(num: u32) -> String {
        format!("{COMIC_PREFIX}{num}")
    }

    pub fn image(num: u32) -> String {
        format!("{IMAGE_PREFIX}{num}")
    }

    /// Parse the comic number out of a `comics/{num}` key.
    pub fn parse_comic(key: &str) -> Option<u32> {
        key.strip_prefix(COMIC_PREFIX)?.parse().ok()
    }
}

/// Typed access to comics, images and listings over a [`KvStore`].
#[derive(Clone)]
pub struct ComicStore {
    kv: Arc<dyn KvStore>,
    max_list_pages: usize,
}

impl ComicStore {
    pub fn new(kv: Arc<dyn KvStore>, max_list_pages: usize) -> Self {
        Self { kv, max_list_pages }
    }

    /// Underlying key-value backend.
    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    /// Upsert a record, overwriting any previous value for its number.
    pub async fn put(&self, record: &ComicRecord) -> Result<()> {
        self.kv.put(&keys::comic(record.num), &record.encode()?).await
    }

    pub async fn get(&self, num: u32) -> Result<Option<ComicRecord>> {
        match self.kv.get(&keys::comic(num)).await? {
            Some(bytes) => Ok(Some(ComicRecord::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put_image(&self, num: u32, blob: &ImageBlob) -> Result<()> {
        self.kv.put(&keys::image(num), &blob.encode()?).await
    }

    pub async fn get_image(&self, num: u32) -> Result<Option<ImageBlob>> {
        match self.kv.get(&keys::image(num)).await? {
            Some(bytes) => Ok(Some(ImageBlob::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Start a drain over all stored comic keys.
    pub fn drain_comics(&self) -> KeyDrain<'_> {
        KeyDrain::new(self.kv(), keys::COMIC_PREFIX, self.max_list_pages)
    }

    /// Every stored comic number, in the order the backend listed them.
    pub async fn list_ids(&self) -> Result<Vec<u32>> {
        let keys = self.drain_comics().collect().await?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                let num = keys::parse_comic(key);
                if num.is_none() {
                    log::debug!("Skipping unrecognized comic key {}", key);
                }
                num
            })
            .collect())
    }
}
