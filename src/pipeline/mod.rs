//! Ingestion pipeline.
//!
//! - `ScrapeCursor`: Persisted progress and target selection
//! - `Ingestor`: Fetch, sanitize, mirror and persist one comic
//! - `SingleFlight`: Per-key coordination of concurrent runs

mod cursor;
mod ingest;
mod single_flight;

pub use cursor::{ScrapeCursor, next_target};
pub use ingest::{IngestOutcome, Ingestor};
pub use single_flight::SingleFlight;
