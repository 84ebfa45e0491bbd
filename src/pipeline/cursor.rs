// src/pipeline/cursor.rs

//! Persisted scrape cursor.
//!
//! A single decimal value under `state/last-scraped` holding the last comic
//! number the ingestor advanced past.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::{KvStore, keys};

/// Reads, advances and targets the scrape cursor.
#[derive(Clone)]
pub struct ScrapeCursor {
    kv: Arc<dyn KvStore>,
    first_id: u32,
}

impl ScrapeCursor {
    pub fn new(kv: Arc<dyn KvStore>, first_id: u32) -> Self {
        Self { kv, first_id }
    }

    /// Last advanced comic number, `0` if never scraped.
    pub async fn last(&self) -> Result<u32> {
        let Some(bytes) = self.kv.get(keys::CURSOR).await? else {
            return Ok(0);
        };
        let raw = String::from_utf8_lossy(&bytes);
        match raw.trim().parse() {
            Ok(last) => Ok(last),
            Err(_) => {
                log::debug!("Unparsable scrape cursor {:?}, treating as 0", raw);
                Ok(0)
            }
        }
    }

    pub async fn advance(&self, num: u32) -> Result<()> {
        self.kv.put(keys::CURSOR, num.to_string().as_bytes()).await?;
        log::debug!("Scrape cursor advanced to {}", num);
        Ok(())
    }

    /// Next comic to scrape given the latest published number.
    pub async fn target(&self, latest: u32) -> Result<u32> {
        Ok(next_target(self.last().await?, latest, self.first_id))
    }
}

/// `last + 1`, restarting from `first_id` once the latest comic is reached.
pub fn next_target(last: u32, latest: u32, first_id: u32) -> u32 {
    if last >= latest {
        first_id
    } else {
        last + 1
    }
}
