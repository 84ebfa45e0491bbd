// src/models/mod.rs

//! Domain models for the ingestion library.

mod comic;
mod config;
mod image;

// Re-export all public types
pub use comic::{ComicRecord, Metadata};
pub use config::{Config, SanitizerConfig, ScrapeConfig, SourceConfig, StorageConfig};
pub use image::ImageBlob;
