// src/lambda/mod.rs

//! AWS Lambda handler for scheduled ingestion.
//!
//! Each invocation runs one ingestion against the S3 backend:
//! 1. Loads config from the bucket (or defaults) and applies env overrides
//! 2. Ingests the requested comic, or the next one after the scrape cursor
//! 3. Reports what was stored

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{StoreConfigLoader, apply_env_overrides};
use crate::error::Result;
use crate::pipeline::{IngestOutcome, Ingestor};
use crate::storage::s3::S3Storage;

/// Lambda invocation payload.
///
/// Scheduler events carry no `id` and advance the scrape cursor.
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    /// Specific comic to ingest
    #[serde(default)]
    pub id: Option<u32>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct ScrapeResponse {
    /// Whether the run completed without a fatal error
    pub success: bool,

    /// Comic number the run targeted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,

    /// Whether a record was persisted
    pub stored: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ScrapeResponse {
    fn from_outcome(outcome: IngestOutcome) -> Self {
        let num = Some(outcome.num());
        match outcome {
            IngestOutcome::Stored(record) => Self {
                success: true,
                num,
                stored: true,
                title: Some(record.title),
                ..Default::default()
            },
            IngestOutcome::Ungettable(_) => Self {
                success: true,
                num,
                ..Default::default()
            },
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<ScrapeRequest>,
) -> std::result::Result<ScrapeResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!("Starting ingestion: id={:?}", request.id);

    match run_scrape(&request).await {
        Ok(mut response) => {
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Ingestion completed: num={:?}, stored={} in {}ms",
                response.num, response.stored, response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Ingestion failed: {}", e);
            Ok(ScrapeResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

/// Internal ingestion logic.
async fn run_scrape(request: &ScrapeRequest) -> Result<ScrapeResponse> {
    let storage = S3Storage::from_env().await?;

    let mut config = StoreConfigLoader::new(&storage).load_config().await?;
    apply_env_overrides(&mut config);
    config.validate()?;

    let storage = storage.with_page_size(config.storage.page_size);
    let ingestor = Ingestor::from_config(&config, Arc::new(storage))?;
    let outcome = ingestor.run(request.id).await?;

    Ok(ScrapeResponse::from_outcome(outcome))
}
