// src/services/source.rs

//! Upstream source client.
//!
//! Fetches comic metadata, annotation pages and image assets. A `404` from
//! any origin is reported as absence; every other non-success status is an
//! [`AppError::Upstream`] for the caller to surface.

use reqwest::{Client, Response, StatusCode};

use crate::error::{AppError, Result};
use crate::models::{ImageBlob, Metadata, SourceConfig};
use crate::utils::http::{create_async_client, header_pairs};

/// Client for the comic API, the annotation wiki and image origins.
#[derive(Clone)]
pub struct SourceClient {
    client: Client,
    config: SourceConfig,
}

impl SourceClient {
    /// Create a source client with its own HTTP client.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = create_async_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: SourceConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Number of the most recently published comic.
    pub async fn latest_published_id(&self) -> Result<Option<u32>> {
        let metadata = self.fetch_json(&self.config.latest_url).await?;
        Ok(metadata.map(|m| m.num))
    }

    pub async fn fetch_metadata(&self, id: u32) -> Result<Option<Metadata>> {
        self.fetch_json(&self.config.metadata_url_for(id)).await
    }

    /// Raw HTML of the annotation page for a comic.
    pub async fn fetch_annotation_page(&self, id: u32) -> Result<Option<String>> {
        let url = self.config.annotation_url_for(id);
        match self.get(&url).await? {
            Some(response) => Ok(Some(response.text().await?)),
            None => Ok(None),
        }
    }

    /// Binary asset and its response headers.
    pub async fn fetch_asset(&self, uri: &str) -> Result<Option<ImageBlob>> {
        let Some(response) = self.get(uri).await? else {
            return Ok(None);
        };
        let headers = header_pairs(response.headers());
        let body = response.bytes().await?;
        Ok(Some(ImageBlob::new(uri, headers, body.to_vec())))
    }

    async fn fetch_json(&self, url: &str) -> Result<Option<Metadata>> {
        match self.get(url).await? {
            Some(response) => {
                let bytes = response.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Send a GET request and classify the status.
    async fn get(&self, url: &str) -> Result<Option<Response>> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            log::debug!("{} is absent upstream", url);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::upstream(url, status.as_u16()));
        }
        Ok(Some(response))
    }
}
