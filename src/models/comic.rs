//! Comic data structures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Metadata document served by the comic API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub num: u32,
    pub title: String,
    pub safe_title: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub news: Option<String>,
}

impl Metadata {
    /// Publication date, if the upstream fields form a valid calendar date.
    pub fn published_on(&self) -> Option<NaiveDate> {
        let year = self.year.as_deref()?.trim().parse().ok()?;
        let month = self.month.as_deref()?.trim().parse().ok()?;
        let day = self.day.as_deref()?.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Canonical record of an ingested comic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComicRecord {
    /// Schema version, 0 for records written before versioning
    #[serde(default)]
    pub version: u32,

    /// Comic number
    pub num: u32,

    pub title: String,

    #[serde(default)]
    pub safe_title: String,

    /// Internal image path when mirrored, otherwise the origin URI
    pub image: String,

    /// Image URI as published upstream
    #[serde(default)]
    pub origin_image: String,

    /// Hover text
    pub alt: String,

    pub transcription: String,

    /// Sanitized explanation fragment, empty if no annotation exists
    pub explanation: String,

    #[serde(default)]
    pub published_on: Option<NaiveDate>,
}

impl ComicRecord {
    pub const CURRENT_VERSION: u32 = 1;

    /// Assemble the record for comic `num` from upstream metadata and the
    /// processed parts. The record is keyed by `num` even if the metadata
    /// reports a different number.
    pub fn assemble(num: u32, metadata: &Metadata, image: String, explanation: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            num,
            title: metadata.title.clone(),
            safe_title: metadata.safe_title.clone(),
            image,
            origin_image: metadata.img.clone(),
            alt: metadata.alt.clone(),
            transcription: metadata.transcript.clone(),
            explanation,
            published_on: metadata.published_on(),
        }
    }

    /// Decode a stored record, rejecting versions this build cannot read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.version > Self::CURRENT_VERSION {
            return Err(AppError::validation(format!(
                "comic {} has schema version {}, newest supported is {}",
                record.num,
                record.version,
                Self::CURRENT_VERSION
            )));
        }
        Ok(record)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Whether the record predates the current schema.
    pub fn is_outdated(&self) -> bool {
        self.version < Self::CURRENT_VERSION
    }

    /// Bring an older record up to the current schema.
    pub fn upgrade(mut self) -> Self {
        if self.safe_title.is_empty() {
            self.safe_title = self.title.clone();
        }
        if self.origin_image.is_empty() && !self.image.starts_with('/') {
            self.origin_image = self.image.clone();
        }
        self.version = Self::CURRENT_VERSION;
        self
    }
}
