//! Sequential navigation over stored comics.
//!
//! The ordering is rebuilt from a full listing on every call; nothing is
//! cached between queries.

use rand::seq::IndexedRandom;

use crate::error::Result;
use crate::storage::ComicStore;

/// Answers next/previous/random queries against a [`ComicStore`].
#[derive(Clone)]
pub struct Navigator {
    store: ComicStore,
}

impl Navigator {
    pub fn new(store: ComicStore) -> Self {
        Self { store }
    }

    /// All stored comic numbers in ascending order.
    pub async fn sorted_ids(&self) -> Result<Vec<u32>> {
        let mut ids = self.store.list_ids().await?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Successor of `num`, wrapping from the largest to the smallest.
    pub async fn next(&self, num: u32) -> Result<Option<u32>> {
        Ok(successor(&self.sorted_ids().await?, num))
    }

    /// Predecessor of `num`, wrapping from the smallest to the largest.
    pub async fn prev(&self, num: u32) -> Result<Option<u32>> {
        Ok(predecessor(&self.sorted_ids().await?, num))
    }

    /// A uniformly chosen stored comic.
    pub async fn random(&self) -> Result<Option<u32>> {
        let ids = self.store.list_ids().await?;
        Ok(ids.choose(&mut rand::rng()).copied())
    }
}

fn successor(ids: &[u32], num: u32) -> Option<u32> {
    let idx = ids.binary_search(&num).ok()?;
    Some(ids[(idx + 1) % ids.len()])
}

fn predecessor(ids: &[u32], num: u32) -> Option<u32> {
    let idx = ids.binary_search(&num).ok()?;
    Some(ids[(idx + ids.len() - 1) % ids.len()])
}
