// src/pipeline/ingest.rs

//! Ingestion state machine.
//!
//! One run walks `DetermineTarget → FetchMetadata → FetchAnnotation →
//! MirrorImage → Persist → AdvanceCursor`. Upstream failures other than
//! absence abort the run before the cursor moves.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{ComicRecord, Config, Metadata};
use crate::pipeline::ScrapeCursor;
use crate::services::{ImageMirror, Sanitizer, SourceClient};
use crate::storage::{ComicStore, KvStore};

/// Result of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The record was assembled and persisted
    Stored(ComicRecord),
    /// Upstream has no such comic; the cursor moved past it
    Ungettable(u32),
}

impl IngestOutcome {
    pub fn num(&self) -> u32 {
        match self {
            Self::Stored(record) => record.num,
            Self::Ungettable(num) => *num,
        }
    }

    pub fn into_record(self) -> Option<ComicRecord> {
        match self {
            Self::Stored(record) => Some(record),
            Self::Ungettable(_) => None,
        }
    }
}

/// Runs the fetch, sanitize, mirror and persist pipeline for one comic.
#[derive(Clone)]
pub struct Ingestor {
    source: SourceClient,
    sanitizer: Arc<Sanitizer>,
    mirror: ImageMirror,
    store: ComicStore,
    cursor: ScrapeCursor,
}

impl Ingestor {
    pub fn new(
        source: SourceClient,
        sanitizer: Arc<Sanitizer>,
        store: ComicStore,
        cursor: ScrapeCursor,
    ) -> Self {
        let mirror = ImageMirror::new(source.clone(), store.clone());
        Self {
            source,
            sanitizer,
            mirror,
            store,
            cursor,
        }
    }

    /// Build an ingestor and its collaborators from configuration.
    pub fn from_config(config: &Config, kv: Arc<dyn KvStore>) -> Result<Self> {
        let source = SourceClient::new(config.source.clone())?;
        let sanitizer = Sanitizer::new(config.sanitizer.clone())?;
        let store = ComicStore::new(Arc::clone(&kv), config.storage.max_list_pages);
        let cursor = ScrapeCursor::new(kv, config.scrape.first_id);
        Ok(Self::new(source, Arc::new(sanitizer), store, cursor))
    }

    pub fn mirror(&self) -> &ImageMirror {
        &self.mirror
    }

    pub fn cursor(&self) -> &ScrapeCursor {
        &self.cursor
    }

    /// Ingest `id`, or the next comic after the cursor when `id` is `None`.
    pub async fn run(&self, id: Option<u32>) -> Result<IngestOutcome> {
        let num = match id {
            Some(num) => num,
            None => self.determine_target().await?,
        };
        log::info!("Ingesting comic {}", num);

        let outcome = self.process(num).await?;
        self.cursor.advance(num).await?;

        match &outcome {
            IngestOutcome::Stored(record) => {
                log::info!("Stored comic {}: {}", record.num, record.title)
            }
            IngestOutcome::Ungettable(num) => {
                log::warn!("Comic {} is not available upstream, skipping", num)
            }
        }
        Ok(outcome)
    }

    async fn determine_target(&self) -> Result<u32> {
        let latest = self.source.latest_published_id().await?.ok_or_else(|| {
            AppError::upstream(&self.source.config().latest_url, 404)
        })?;
        let target = self.cursor.target(latest).await?;
        log::debug!("Latest published comic is {}, target {}", latest, target);
        Ok(target)
    }

    async fn process(&self, num: u32) -> Result<IngestOutcome> {
        let Some(metadata) = self.source.fetch_metadata(num).await? else {
            return Ok(IngestOutcome::Ungettable(num));
        };
        if metadata.num != num {
            log::warn!(
                "Requested comic {} but upstream returned {}, storing under {}",
                num,
                metadata.num,
                num
            );
        }

        let explanation = match self.source.fetch_annotation_page(num).await? {
            Some(page) => self.sanitizer.sanitize(&page)?,
            None => {
                log::info!("No annotation page for comic {}", num);
                String::new()
            }
        };

        let image = self.mirror_image(num, &metadata).await;
        let record = ComicRecord::assemble(num, &metadata, image, explanation);
        self.store.put(&record).await?;
        Ok(IngestOutcome::Stored(record))
    }

    /// Mirror the illustration, falling back to the origin URI on failure.
    async fn mirror_image(&self, num: u32, metadata: &Metadata) -> String {
        if metadata.img.is_empty() {
            log::warn!("Comic {} has no image to mirror", num);
            return String::new();
        }

        match self.mirror.mirror(&metadata.img, num).await {
            Ok(Some(num)) => ImageMirror::internal_path(num),
            Ok(None) => metadata.img.clone(),
            Err(e) => {
                log::warn!("Failed to mirror image for comic {}: {}", num, e);
                metadata.img.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceConfig;
    use crate::storage::{MemoryStorage, keys};
    use mockito::{Mock, Server, ServerGuard};

    const ANNOTATION: &str = r#"<html><body>
<h2><span class="mw-headline" id="Explanation">Explanation</span></h2>
<p class="lead">See <a href="/wiki/index.php/327:_Exploits_of_a_Mom">Bobby Tables</a>.</p>
<h2><span class="mw-headline" id="Discussion">Discussion</span></h2>
<p>Off topic.</p>
</body></html>"#;

    struct Fixture {
        server: ServerGuard,
        ingestor: Ingestor,
        store: ComicStore,
        kv: Arc<MemoryStorage>,
    }

    async fn fixture() -> Fixture {
        let server = Server::new_async().await;
        let config = SourceConfig {
            latest_url: format!("{}/info.0.json", server.url()),
            metadata_url: format!("{}/{{id}}/info.0.json", server.url()),
            annotation_url: format!("{}/wiki/index.php/{{id}}", server.url()),
            ..SourceConfig::default()
        };
        let kv = Arc::new(MemoryStorage::new());
        let store = ComicStore::new(kv.clone(), 100);
        let ingestor = Ingestor::new(
            SourceClient::new(config).unwrap(),
            Arc::new(Sanitizer::new(Default::default()).unwrap()),
            store.clone(),
            ScrapeCursor::new(kv.clone(), 1),
        );
        Fixture {
            server,
            ingestor,
            store,
            kv,
        }
    }

    fn metadata_json(server: &Server, num: u32) -> String {
        format!(
            r#"{{"num": {num}, "title": "Comic {num}", "safe_title": "Comic {num}",
                "alt": "alt {num}", "transcript": "[[text {num}]]",
                "img": "{}/comics/{num}.png", "year": "2009", "month": "2", "day": "{num}"}}"#,
            server.url()
        )
    }

    async fn mock_comic(server: &mut Server, num: u32, annotation: Option<&str>) -> Vec<Mock> {
        let body = metadata_json(server, num);
        let mut mocks = vec![
            server
                .mock("GET", format!("/{num}/info.0.json").as_str())
                .with_status(200)
                .with_body(body)
                .create_async()
                .await,
            server
                .mock("GET", format!("/comics/{num}.png").as_str())
                .with_status(200)
                .with_header("content-type", "image/png")
                .with_body(format!("png-{num}"))
                .create_async()
                .await,
        ];
        let annotation_mock = server.mock("GET", format!("/wiki/index.php/{num}").as_str());
        mocks.push(match annotation {
            Some(page) => annotation_mock.with_status(200).with_body(page),
            None => annotation_mock.with_status(404),
        }
        .create_async()
        .await);
        mocks
    }

    async fn mock_latest(server: &mut Server, num: u32) -> Mock {
        let body = metadata_json(server, num);
        server
            .mock("GET", "/info.0.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    async fn cursor_value(kv: &MemoryStorage) -> Option<Vec<u8>> {
        kv.get(keys::CURSOR).await.unwrap()
    }

    #[tokio::test]
    async fn test_tick_ingests_first_comic() {
        let mut fx = fixture().await;
        mock_latest(&mut fx.server, 3).await;
        mock_comic(&mut fx.server, 1, Some(ANNOTATION)).await;

        let outcome = fx.ingestor.run(None).await.unwrap();
        let record = outcome.into_record().unwrap();

        assert_eq!(record.num, 1);
        assert_eq!(record.title, "Comic 1");
        assert_eq!(record.image, "/images/1");
        assert!(record.origin_image.ends_with("/comics/1.png"));
        assert!(record.explanation.contains(r#"href="/327""#));
        assert!(!record.explanation.contains("Off topic"));

        assert_eq!(fx.store.get(1).await.unwrap(), Some(record));
        let blob = fx.store.get_image(1).await.unwrap().unwrap();
        assert_eq!(blob.body, b"png-1".to_vec());
        assert_eq!(cursor_value(&fx.kv).await, Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let mut fx = fixture().await;
        mock_comic(&mut fx.server, 2, Some(ANNOTATION)).await;

        fx.ingestor.run(Some(2)).await.unwrap();
        let first = fx.kv.get(&keys::comic(2)).await.unwrap().unwrap();
        fx.ingestor.run(Some(2)).await.unwrap();
        let second = fx.kv.get(&keys::comic(2)).await.unwrap().unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_annotation_keeps_metadata() {
        let mut fx = fixture().await;
        mock_comic(&mut fx.server, 4, None).await;

        let record = fx.ingestor.run(Some(4)).await.unwrap().into_record().unwrap();

        assert_eq!(record.explanation, "");
        assert_eq!(record.title, "Comic 4");
        assert_eq!(record.alt, "alt 4");
        assert_eq!(record.transcription, "[[text 4]]");
        assert!(fx.store.get(4).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mismatched_metadata_stored_under_requested_num() {
        let mut fx = fixture().await;
        let body = metadata_json(&fx.server, 22);
        fx.server
            .mock("GET", "/21/info.0.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        fx.server
            .mock("GET", "/comics/22.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png-22")
            .create_async()
            .await;
        fx.server
            .mock("GET", "/wiki/index.php/21")
            .with_status(404)
            .create_async()
            .await;

        let record = fx.ingestor.run(Some(21)).await.unwrap().into_record().unwrap();

        assert_eq!(record.num, 21);
        assert_eq!(record.image, "/images/21");
        assert_eq!(fx.store.get(21).await.unwrap(), Some(record));
        assert!(fx.store.get(22).await.unwrap().is_none());
        assert!(fx.store.get_image(21).await.unwrap().is_some());
        assert!(fx.store.get_image(22).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ungettable_advances_cursor_without_record() {
        let mut fx = fixture().await;
        fx.server
            .mock("GET", "/404/info.0.json")
            .with_status(404)
            .create_async()
            .await;

        let outcome = fx.ingestor.run(Some(404)).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Ungettable(404));
        assert!(fx.store.get(404).await.unwrap().is_none());
        assert_eq!(cursor_value(&fx.kv).await, Some(b"404".to_vec()));
    }

    #[tokio::test]
    async fn test_upstream_error_leaves_cursor() {
        let mut fx = fixture().await;
        fx.ingestor.cursor().advance(6).await.unwrap();
        mock_latest(&mut fx.server, 10).await;
        fx.server
            .mock("GET", "/7/info.0.json")
            .with_status(500)
            .create_async()
            .await;

        let err = fx.ingestor.run(None).await.unwrap_err();

        assert!(matches!(err, AppError::Upstream { status: 500, .. }));
        assert_eq!(cursor_value(&fx.kv).await, Some(b"6".to_vec()));
        assert!(fx.store.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_annotation_error_is_fatal() {
        let mut fx = fixture().await;
        let body = metadata_json(&fx.server, 8);
        fx.server
            .mock("GET", "/8/info.0.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        fx.server
            .mock("GET", "/wiki/index.php/8")
            .with_status(502)
            .create_async()
            .await;

        let err = fx.ingestor.run(Some(8)).await.unwrap_err();

        assert!(err.is_upstream());
        assert!(cursor_value(&fx.kv).await.is_none());
        assert!(fx.store.get(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_wraps_after_latest() {
        let mut fx = fixture().await;
        fx.ingestor.cursor().advance(3).await.unwrap();
        mock_latest(&mut fx.server, 3).await;
        mock_comic(&mut fx.server, 1, None).await;

        let outcome = fx.ingestor.run(None).await.unwrap();

        assert_eq!(outcome.num(), 1);
        assert_eq!(cursor_value(&fx.kv).await, Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_absent_latest_is_fatal() {
        let mut fx = fixture().await;
        fx.server
            .mock("GET", "/info.0.json")
            .with_status(404)
            .create_async()
            .await;

        let err = fx.ingestor.run(None).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(cursor_value(&fx.kv).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_image_keeps_origin_uri() {
        let mut fx = fixture().await;
        let body = metadata_json(&fx.server, 5);
        fx.server
            .mock("GET", "/5/info.0.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        fx.server
            .mock("GET", "/wiki/index.php/5")
            .with_status(404)
            .create_async()
            .await;
        fx.server
            .mock("GET", "/comics/5.png")
            .with_status(404)
            .create_async()
            .await;

        let record = fx.ingestor.run(Some(5)).await.unwrap().into_record().unwrap();

        assert_eq!(record.image, record.origin_image);
        assert!(fx.store.get_image(5).await.unwrap().is_none());
    }
}
