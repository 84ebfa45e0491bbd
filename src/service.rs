// src/service.rs

//! Inbound interface of the ingestion core.
//!
//! Reads are served from the store and fall through to the ingestion
//! pipeline on a miss. Concurrent misses for the same comic share a single
//! upstream run.

use std::pin::pin;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ComicRecord, Config, ImageBlob};
use crate::pipeline::{Ingestor, SingleFlight};
use crate::services::Navigator;
use crate::storage::{ComicStore, KvStore, keys};

/// Counts reported by [`ComicService::migrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    pub upgraded: usize,
}

/// Ingestion, read-through lookup and navigation over stored comics.
pub struct ComicService {
    ingestor: Ingestor,
    store: ComicStore,
    navigator: Navigator,
    records: SingleFlight<u32, Option<ComicRecord>>,
    images: SingleFlight<u32, Option<ImageBlob>>,
}

impl ComicService {
    pub fn new(ingestor: Ingestor, store: ComicStore) -> Self {
        Self {
            ingestor,
            navigator: Navigator::new(store.clone()),
            store,
            records: SingleFlight::new(),
            images: SingleFlight::new(),
        }
    }

    /// Wire up the full service over a key-value backend.
    pub fn from_config(config: &Config, kv: Arc<dyn KvStore>) -> Result<Self> {
        let ingestor = Ingestor::from_config(config, Arc::clone(&kv))?;
        let store = ComicStore::new(kv, config.storage.max_list_pages);
        Ok(Self::new(ingestor, store))
    }

    pub fn store(&self) -> &ComicStore {
        &self.store
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// Run one ingestion. Without an id the scrape cursor picks the target.
    pub async fn ingest(&self, id: Option<u32>) -> Result<Option<ComicRecord>> {
        match id {
            Some(num) => {
                self.records
                    .run(num, || async move {
                        Ok(self.ingestor.run(Some(num)).await?.into_record())
                    })
                    .await
            }
            None => Ok(self.ingestor.run(None).await?.into_record()),
        }
    }

    /// Stored record for `num`, ingesting it on a miss.
    pub async fn get(&self, num: u32) -> Result<Option<ComicRecord>> {
        if let Some(record) = self.store.get(num).await? {
            return Ok(Some(record));
        }

        log::info!("Comic {} not stored, reading through", num);
        self.records
            .run(num, || async move {
                // A run that finished just before this one may have stored it
                if let Some(record) = self.store.get(num).await? {
                    return Ok(Some(record));
                }
                Ok(self.ingestor.run(Some(num)).await?.into_record())
            })
            .await
    }

    /// Mirrored image for `num`, mirroring it on a miss.
    pub async fn get_image(&self, num: u32) -> Result<Option<ImageBlob>> {
        if let Some(blob) = self.store.get_image(num).await? {
            return Ok(Some(blob));
        }

        let mirror = self.ingestor.mirror();
        self.images
            .run(num, || async move { mirror.serve_or_fetch(num).await })
            .await
    }

    /// Stored comic numbers in ascending order.
    pub async fn ids(&self) -> Result<Vec<u32>> {
        self.navigator.sorted_ids().await
    }

    pub async fn next(&self, num: u32) -> Result<Option<u32>> {
        self.navigator.next(num).await
    }

    pub async fn prev(&self, num: u32) -> Result<Option<u32>> {
        self.navigator.prev(num).await
    }

    pub async fn random(&self) -> Result<Option<u32>> {
        self.navigator.random().await
    }

    /// Every stored record in ascending comic order.
    pub async fn export(&self) -> Result<Vec<ComicRecord>> {
        let mut records = Vec::new();
        for num in self.navigator.sorted_ids().await? {
            match self.store.get(num).await? {
                Some(record) => records.push(record),
                None => log::warn!("Comic {} vanished during export", num),
            }
        }
        Ok(records)
    }

    /// Rewrite every record stored under an older schema version.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let mut pages = pin!(self.store.drain_comics().into_pages());

        while let Some(page) = pages.try_next().await? {
            for key in page {
                let Some(num) = keys::parse_comic(&key) else {
                    continue;
                };
                let Some(record) = self.store.get(num).await? else {
                    continue;
                };
                report.scanned += 1;

                if record.is_outdated() {
                    log::debug!("Upgrading comic {} from version {}", num, record.version);
                    self.store.put(&record.upgrade()).await?;
                    report.upgraded += 1;
                }
            }
        }

        log::info!(
            "Migration scanned {} records, upgraded {}",
            report.scanned,
            report.upgraded
        );
        Ok(report)
    }
}
