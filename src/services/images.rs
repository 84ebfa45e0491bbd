// src/services/images.rs

//! Image mirroring service.
//!
//! Copies comic images with their original response headers into the store
//! so they can be served from the mirror's own domain.

use crate::error::Result;
use crate::models::ImageBlob;
use crate::services::SourceClient;
use crate::storage::ComicStore;

/// Mirrors and serves comic images keyed by comic number.
#[derive(Clone)]
pub struct ImageMirror {
    source: SourceClient,
    store: ComicStore,
}

impl ImageMirror {
    pub fn new(source: SourceClient, store: ComicStore) -> Self {
        Self { source, store }
    }

    /// Path under which a mirrored image is served.
    pub fn internal_path(num: u32) -> String {
        format!("/images/{num}")
    }

    /// Copy the asset at `uri` into the store under `num`.
    ///
    /// Returns the number it was stored under, or `None` if the asset does
    /// not exist upstream.
    pub async fn mirror(&self, uri: &str, num: u32) -> Result<Option<u32>> {
        Ok(self.mirror_blob(uri, num).await?.map(|_| num))
    }

    /// Stored image for `num`, without touching upstream.
    pub async fn serve(&self, num: u32) -> Result<Option<ImageBlob>> {
        self.store.get_image(num).await
    }

    /// Stored image for `num`, mirroring it first on a miss.
    pub async fn serve_or_fetch(&self, num: u32) -> Result<Option<ImageBlob>> {
        if let Some(blob) = self.serve(num).await? {
            return Ok(Some(blob));
        }

        log::info!("Image {} not mirrored yet, fetching", num);
        let Some(metadata) = self.source.fetch_metadata(num).await? else {
            return Ok(None);
        };
        if metadata.img.is_empty() {
            log::warn!("Comic {} has no image", num);
            return Ok(None);
        }
        self.mirror_blob(&metadata.img, num).await
    }

    async fn mirror_blob(&self, uri: &str, num: u32) -> Result<Option<ImageBlob>> {
        let Some(blob) = self.source.fetch_asset(uri).await? else {
            log::warn!("Image for comic {} is missing upstream: {}", num, uri);
            return Ok(None);
        };

        self.store.put_image(num, &blob).await?;
        log::debug!(
            "Mirrored {} bytes ({}) for comic {}",
            blob.body.len(),
            blob.content_type().unwrap_or("unknown type"),
            num
        );
        Ok(Some(blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceConfig;
    use crate::storage::MemoryStorage;
    use mockito::Server;
    use std::sync::Arc;

    fn mirror_for(server: &Server) -> (ImageMirror, ComicStore) {
        let config = SourceConfig {
            metadata_url: format!("{}/{{id}}/info.0.json", server.url()),
            ..SourceConfig::default()
        };
        let store = ComicStore::new(Arc::new(MemoryStorage::new()), 10);
        let source = SourceClient::new(config).unwrap();
        (ImageMirror::new(source, store.clone()), store)
    }

    #[tokio::test]
    async fn test_mirror_stores_body_and_headers() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/comics/a.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("PNG")
            .create_async()
            .await;

        let (mirror, store) = mirror_for(&server);
        let uri = format!("{}/comics/a.png", server.url());
        assert_eq!(mirror.mirror(&uri, 5).await.unwrap(), Some(5));

        let blob = store.get_image(5).await.unwrap().unwrap();
        assert_eq!(blob.body, b"PNG".to_vec());
        assert_eq!(blob.content_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_serve_or_fetch_reads_through_once() {
        let mut server = Server::new_async().await;
        let metadata = server
            .mock("GET", "/9/info.0.json")
            .with_status(200)
            .with_body(format!(
                r#"{{"num": 9, "title": "t", "safe_title": "t", "alt": "", "transcript": "",
                    "img": "{}/comics/nine.gif"}}"#,
                server.url()
            ))
            .expect(1)
            .create_async()
            .await;
        let asset = server
            .mock("GET", "/comics/nine.gif")
            .with_status(200)
            .with_header("content-type", "image/gif")
            .with_body("GIF89a")
            .expect(1)
            .create_async()
            .await;

        let (mirror, _) = mirror_for(&server);
        assert!(mirror.serve(9).await.unwrap().is_none());

        let first = mirror.serve_or_fetch(9).await.unwrap().unwrap();
        let second = mirror.serve_or_fetch(9).await.unwrap().unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(second.content_type(), Some("image/gif"));

        metadata.assert_async().await;
        asset.assert_async().await;
    }

    #[tokio::test]
    async fn test_serve_or_fetch_unknown_comic() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/404/info.0.json")
            .with_status(404)
            .create_async()
            .await;

        let (mirror, _) = mirror_for(&server);
        assert!(mirror.serve_or_fetch(404).await.unwrap().is_none());
    }
}
