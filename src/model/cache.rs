use nalgebra::DMatrix;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineResult;

/// Bounded LRU cache of Leontief inverses keyed by model version id.
///
/// Model versions are immutable, so entries never go stale; they only leave
/// through eviction.
#[derive(Debug)]
pub struct LeontiefCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Uuid, Arc<DMatrix<f64>>>,
    /// Least recently used at the front.
    order: VecDeque<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl LeontiefCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: Uuid) -> Option<Arc<DMatrix<f64>>> {
        let mut inner = self.inner.lock();
        let value = inner.entries.get(&key).cloned()?;
        inner.touch(key);
        Some(value)
    }

    /// Returns the cached inverse, computing it outside the lock on a miss.
    /// Concurrent misses for the same key may both compute; the result is
    /// identical either way.
    pub fn get_or_try_insert(
        &self,
        key: Uuid,
        compute: impl FnOnce() -> EngineResult<DMatrix<f64>>,
    ) -> EngineResult<Arc<DMatrix<f64>>> {
        if let Some(hit) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(model_version_id = %key, "leontief cache hit");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(model_version_id = %key, "leontief cache miss");
        let value = Arc::new(compute()?);
        self.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn insert(&self, key: Uuid, value: Arc<DMatrix<f64>>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.entries.insert(key, value).is_some() {
            inner.touch(key);
            return;
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
                debug!(model_version_id = %evicted, "leontief cache evicted");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.lock().entries.len(),
        }
    }
}

impl CacheInner {
    fn touch(&mut self, key: Uuid) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }
}
