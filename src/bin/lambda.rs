//! AWS Lambda entry point for comic ingestion
//!
//! Deploy with `cargo lambda build --release --features lambda` and trigger
//! on a schedule; every invocation ingests one comic.
//!
//! ## Environment Variables
//!
//! - `S3_BUCKET`: S3 bucket holding the store (required)
//! - `S3_PREFIX`: S3 key prefix (default: `comic-ingest`)
//! - `COMIC_USER_AGENT`: User-Agent sent upstream
//! - `COMIC_TIMEOUT_SECS`: HTTP request timeout
//! - `COMIC_FIRST_ID`: Where the scrape cursor wraps to
//! - `RUST_LOG`: Log level (e.g., `info`, `debug`)

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Comic ingest Lambda starting...");
    lambda_runtime::run(service_fn(comic_ingest::lambda::handler)).await
}
