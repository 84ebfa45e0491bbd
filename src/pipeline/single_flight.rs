// src/pipeline/single_flight.rs

//! Per-key in-flight request coordination.
//!
//! At most one run per key executes at a time; callers arriving while it is
//! in progress await the same result instead of starting their own.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::{AppError, Result};

type Outcome<V> = std::result::Result<V, Arc<AppError>>;

/// Deduplicates concurrent work keyed by `K`.
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<OnceCell<Outcome<V>>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key` unless a run for the same key is already in
    /// flight, in which case wait for that run and return a clone of its
    /// result. Errors from a shared run surface as [`AppError::Shared`].
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = {
            let mut calls = self.calls.lock().await;
            Arc::clone(
                calls
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let outcome = cell
            .get_or_init(|| async move { work().await.map_err(Arc::new) })
            .await
            .clone();

        let mut calls = self.calls.lock().await;
        if calls.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            calls.remove(&key);
        }

        outcome.map_err(AppError::from)
    }

    /// Number of keys with a run in progress.
    pub async fn in_flight(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
