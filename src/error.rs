// src/error.rs

//! Unified error handling for the ingestion library.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a status was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream answered with a status other than success or not-found
    #[error("Upstream error for {url}: HTTP {status}")]
    Upstream { url: String, status: u16 },

    /// A paginated listing did not terminate
    #[error("Pagination error for prefix '{prefix}': {message}")]
    Pagination { prefix: String, message: String },

    /// HTML rewriting failed
    #[error("Markup error: {0}")]
    Markup(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failure of an in-flight run shared by several callers
    #[error("{0}")]
    Shared(Arc<AppError>),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an upstream status error.
    pub fn upstream(url: impl Into<String>, status: u16) -> Self {
        Self::Upstream {
            url: url.into(),
            status,
        }
    }

    /// Create a pagination error for a listing prefix.
    pub fn pagination(prefix: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pagination {
            prefix: prefix.into(),
            message: message.to_string(),
        }
    }

    /// Create a markup rewriting error.
    pub fn markup(message: impl fmt::Display) -> Self {
        Self::Markup(message.to_string())
    }

    /// Create a storage backend error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether this error is an upstream status failure, looking through
    /// shared wrappers.
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Upstream { .. } => true,
            Self::Shared(inner) => inner.is_upstream(),
            _ => false,
        }
    }
}

impl From<Arc<AppError>> for AppError {
    fn from(error: Arc<AppError>) -> Self {
        Self::Shared(error)
    }
}
