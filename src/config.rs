// src/config.rs

//! Configuration loading utilities.
//!
//! Local runs read `config.toml` from disk. The Lambda reads the same file
//! from the key-value store it ingests into and applies environment
//! overrides on top.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::storage::KvStore;

/// Key the configuration is stored under in a key-value backend.
pub const CONFIG_KEY: &str = "config/config.toml";

/// Config loader reading TOML documents out of a key-value store.
pub struct StoreConfigLoader<'a> {
    kv: &'a dyn KvStore,
    key: String,
}

impl<'a> StoreConfigLoader<'a> {
    pub fn new(kv: &'a dyn KvStore) -> Self {
        Self::with_key(kv, CONFIG_KEY)
    }

    pub fn with_key(kv: &'a dyn KvStore, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    async fn load_toml<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        log::info!("Loading config from store: {}", self.key);
        let Some(bytes) = self.kv.get(&self.key).await? else {
            return Ok(None);
        };

        let s = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("Config {} is not valid UTF-8: {}", self.key, e))
        })?;
        Ok(Some(toml::from_str(&s)?))
    }

    /// Load the stored config, falling back to defaults if none is stored.
    pub async fn load_config(&self) -> Result<Config> {
        let config = match self.load_toml().await? {
            Some(config) => config,
            None => {
                log::info!("No config stored at {}, using defaults", self.key);
                Config::default()
            }
        };
        config.validate()?;
        Ok(config)
    }
}

/// Load and validate configuration from a TOML file.
///
/// A missing or unreadable file falls back to defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    Ok(config)
}

/// Apply `COMIC_*` overrides looked up through `var`.
pub fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(agent) = var("COMIC_USER_AGENT") {
        config.source.user_agent = agent;
    }

    if let Some(timeout) = var("COMIC_TIMEOUT_SECS") {
        match timeout.parse() {
            Ok(secs) => config.source.timeout_secs = secs,
            Err(_) => log::warn!("Ignoring invalid COMIC_TIMEOUT_SECS={}", timeout),
        }
    }

    if let Some(first) = var("COMIC_FIRST_ID") {
        match first.parse() {
            Ok(id) => config.scrape.first_id = id,
            Err(_) => log::warn!("Ignoring invalid COMIC_FIRST_ID={}", first),
        }
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |name| std::env::var(name).ok());
}
