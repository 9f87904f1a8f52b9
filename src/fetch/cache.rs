// src/fetch/cache.rs
//! Run-scoped single-flight cache: `(source, target)` -> completed `SourceResult`.
//!
//! Each key owns a `tokio::sync::OnceCell`. The map mutex is held only long enough to
//! find or insert the cell; the fetch itself runs inside `get_or_init`, so concurrent
//! first-time callers for the same key wait on one producer and all observe its value.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use metrics::counter;
use tokio::sync::OnceCell;

use crate::fetch::types::{SourceKind, SourceResult};

pub type CacheKey = (SourceKind, String);

#[derive(Debug, Default)]
pub struct RunCache {
    slots: Mutex<HashMap<CacheKey, Arc<OnceCell<SourceResult>>>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: CacheKey) -> Arc<OnceCell<SourceResult>> {
        let mut slots = self.slots.lock().expect("run cache mutex poisoned");
        slots.entry(key).or_default().clone()
    }

    /// Return the cached result for `(source, target)`, invoking `fetch_fn` only if no
    /// result exists yet and no other caller is already producing it.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        source: &SourceKind,
        target: &str,
        fetch_fn: F,
    ) -> SourceResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SourceResult>,
    {
        let cell = self.slot((source.clone(), target.to_string()));
        let mut produced = false;
        let value = cell
            .get_or_init(|| {
                produced = true;
                fetch_fn()
            })
            .await
            .clone();
        // Waiters on an in-flight producer count as hits too.
        if !produced {
            counter!("fetch_cache_hits_total").increment(1);
        }
        value
    }

    /// Completed result for a key, if any.
    pub fn get(&self, source: &SourceKind, target: &str) -> Option<SourceResult> {
        let slots = self.slots.lock().expect("run cache mutex poisoned");
        slots
            .get(&(source.clone(), target.to_string()))
            .and_then(|c| c.get().cloned())
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().expect("run cache mutex poisoned");
        slots.values().filter(|c| c.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
