//! Service layer for the ingestion library.
//!
//! This module contains the building blocks of the pipeline:
//! - Upstream fetching (`SourceClient`)
//! - Annotation cleanup and link rewriting (`Sanitizer`)
//! - Image mirroring (`ImageMirror`)
//! - Next/previous/random lookups (`Navigator`)

mod images;
mod navigation;
mod sanitizer;
mod source;

pub use images::ImageMirror;
pub use navigation::Navigator;
pub use sanitizer::Sanitizer;
pub use source::SourceClient;
