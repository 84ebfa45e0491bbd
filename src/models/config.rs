//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream endpoints and HTTP behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Annotation page extraction and link rewriting rules
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Key-value store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scrape cursor behavior
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        for (name, template) in [
            ("source.metadata_url", &self.source.metadata_url),
            ("source.annotation_url", &self.source.annotation_url),
        ] {
            if !template.contains("{id}") {
                return Err(AppError::validation(format!(
                    "{name} must contain an {{id}} placeholder"
                )));
            }
        }
        url::Url::parse(&self.source.latest_url)?;
        let origin = url::Url::parse(&self.sanitizer.annotation_origin)?;
        if origin.path() != "/" || self.sanitizer.annotation_origin.ends_with('/') {
            return Err(AppError::validation(
                "sanitizer.annotation_origin must be a bare origin without a trailing slash",
            ));
        }
        if !self.sanitizer.article_path_prefix.starts_with('/') {
            return Err(AppError::validation(
                "sanitizer.article_path_prefix must start with '/'",
            ));
        }
        if self.storage.page_size == 0 {
            return Err(AppError::validation("storage.page_size must be > 0"));
        }
        if self.storage.max_list_pages == 0 {
            return Err(AppError::validation("storage.max_list_pages must be > 0"));
        }
        if self.scrape.first_id == 0 {
            return Err(AppError::validation("scrape.first_id must be > 0"));
        }
        Ok(())
    }
}

/// Upstream endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// User-Agent header sent with every request
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Metadata of the most recently published comic
    #[serde(default = "defaults::latest_url")]
    pub latest_url: String,

    /// Metadata of a single comic, `{id}` is substituted
    #[serde(default = "defaults::metadata_url")]
    pub metadata_url: String,

    /// Annotation page of a single comic, `{id}` is substituted
    #[serde(default = "defaults::annotation_url")]
    pub annotation_url: String,
}

impl SourceConfig {
    pub fn metadata_url_for(&self, id: u32) -> String {
        self.metadata_url.replace("{id}", &id.to_string())
    }

    pub fn annotation_url_for(&self, id: u32) -> String {
        self.annotation_url.replace("{id}", &id.to_string())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            latest_url: defaults::latest_url(),
            metadata_url: defaults::metadata_url(),
            annotation_url: defaults::annotation_url(),
        }
    }
}

/// Annotation page extraction and rewriting rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Selector of the element that opens the explanation section
    #[serde(default = "defaults::explanation_marker")]
    pub explanation_marker: String,

    /// Selector of the element that opens the discussion section
    #[serde(default = "defaults::discussion_marker")]
    pub discussion_marker: String,

    /// Notice blocks removed entirely
    #[serde(default = "defaults::notice_selectors")]
    pub notice_selectors: Vec<String>,

    /// Data tables wrapped in a horizontally scrollable container
    #[serde(default = "defaults::data_table_selectors")]
    pub data_table_selectors: Vec<String>,

    /// Origin prepended to root-relative references
    #[serde(default = "defaults::annotation_origin")]
    pub annotation_origin: String,

    /// Path under which annotation articles live
    #[serde(default = "defaults::article_path_prefix")]
    pub article_path_prefix: String,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            explanation_marker: defaults::explanation_marker(),
            discussion_marker: defaults::discussion_marker(),
            notice_selectors: defaults::notice_selectors(),
            data_table_selectors: defaults::data_table_selectors(),
            annotation_origin: defaults::annotation_origin(),
            article_path_prefix: defaults::article_path_prefix(),
        }
    }
}

/// Key-value store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem store
    #[serde(default = "defaults::root_dir")]
    pub root_dir: String,

    /// Keys returned per listing page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Upper bound on pages followed by a single drain
    #[serde(default = "defaults::max_list_pages")]
    pub max_list_pages: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
            page_size: defaults::page_size(),
            max_list_pages: defaults::max_list_pages(),
        }
    }
}

/// Scrape cursor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// First id of the corpus, where the cursor wraps to
    #[serde(default = "defaults::first_id")]
    pub first_id: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            first_id: defaults::first_id(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn user_agent() -> String {
        "comic-ingest/0.1 (explainxkcd mirror for mobile reading)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn latest_url() -> String {
        "https://xkcd.com/info.0.json".into()
    }
    pub fn metadata_url() -> String {
        "https://xkcd.com/{id}/info.0.json".into()
    }
    pub fn annotation_url() -> String {
        "https://www.explainxkcd.com/wiki/index.php/{id}".into()
    }

    // Sanitizer defaults
    pub fn explanation_marker() -> String {
        "#Explanation".into()
    }
    pub fn discussion_marker() -> String {
        "#Discussion".into()
    }
    pub fn notice_selectors() -> Vec<String> {
        vec!["table.notice".into(), "table.ambox".into()]
    }
    pub fn data_table_selectors() -> Vec<String> {
        vec!["table.wikitable".into()]
    }
    pub fn annotation_origin() -> String {
        "https://www.explainxkcd.com".into()
    }
    pub fn article_path_prefix() -> String {
        "/wiki/index.php/".into()
    }

    // Storage defaults
    pub fn root_dir() -> String {
        "storage".into()
    }
    pub fn page_size() -> usize {
        1000
    }
    pub fn max_list_pages() -> usize {
        10_000
    }

    // Scrape defaults
    pub fn first_id() -> u32 {
        1
    }
}
