//! Named, independently invalidatable cache entries shared by the pipeline.
//!
//! Every entry holds an `Arc` snapshot that is replaced wholesale; readers never
//! observe a partially updated value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::model::{DeployedBlock, EngineStatus, Extension, RepositoryItem};

/// A single memoized value.
///
/// Population happens while the slot lock is held, so concurrent callers share
/// one in-flight fetch instead of issuing their own.
pub struct Slot<T> {
    value: Mutex<Option<Arc<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T> Slot<T> {
    pub fn get_or_try_populate(&self, populate: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let mut guard = lock(&self.value);
        if let Some(v) = guard.as_ref() {
            return Ok(v.clone());
        }
        let v = Arc::new(populate()?);
        *guard = Some(v.clone());
        Ok(v)
    }

    pub fn set(&self, value: T) -> Arc<T> {
        let v = Arc::new(value);
        *lock(&self.value) = Some(v.clone());
        v
    }

    pub fn peek(&self) -> Option<Arc<T>> {
        lock(&self.value).clone()
    }

    pub fn invalidate(&self) {
        *lock(&self.value) = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
    DeployedBlocks,
    Extensions,
    EngineId,
    EngineStatus,
    Listing(String),
    AllListings,
}

#[derive(Default)]
pub struct Cache {
    pub deployed_blocks: Slot<Vec<DeployedBlock>>,
    pub extensions: Slot<Vec<Extension>>,
    pub engine_id: Slot<Option<String>>,
    pub engine_status: Slot<EngineStatus>,
    listings: Mutex<HashMap<String, Arc<Slot<Vec<RepositoryItem>>>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot holding the resolved listing of one repository.
    pub fn listing(&self, repository_id: &str) -> Arc<Slot<Vec<RepositoryItem>>> {
        lock(&self.listings)
            .entry(repository_id.to_string())
            .or_default()
            .clone()
    }

    pub fn has_listing(&self, repository_id: &str) -> bool {
        lock(&self.listings)
            .get(repository_id)
            .is_some_and(|s| s.peek().is_some())
    }

    pub fn invalidate(&self, key: CacheKey) {
        tracing::debug!(?key, "invalidate cache entry");
        match key {
            CacheKey::DeployedBlocks => self.deployed_blocks.invalidate(),
            CacheKey::Extensions => self.extensions.invalidate(),
            CacheKey::EngineId => self.engine_id.invalidate(),
            CacheKey::EngineStatus => self.engine_status.invalidate(),
            CacheKey::Listing(id) => {
                lock(&self.listings).remove(&id);
            }
            CacheKey::AllListings => lock(&self.listings).clear(),
        }
    }

    /// Drops everything derived from the running engine.
    pub fn invalidate_engine(&self) {
        self.invalidate(CacheKey::DeployedBlocks);
        self.invalidate(CacheKey::Extensions);
        self.invalidate(CacheKey::EngineId);
        self.invalidate(CacheKey::EngineStatus);
    }

    pub fn invalidate_listings(&self) {
        self.invalidate(CacheKey::AllListings);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while populating leaves the previous value intact.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn slot_populates_once_until_invalidated() {
        let slot: Slot<u32> = Slot::default();
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(7)
        };
        assert_eq!(*slot.get_or_try_populate(fetch).unwrap(), 7);
        assert_eq!(*slot.get_or_try_populate(fetch).unwrap(), 7);
        assert_eq!(calls.get(), 1);

        slot.invalidate();
        assert!(slot.peek().is_none());
        slot.get_or_try_populate(fetch).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failed_population_leaves_slot_empty() {
        let slot: Slot<u32> = Slot::default();
        assert!(slot.get_or_try_populate(|| anyhow::bail!("boom")).is_err());
        assert!(slot.peek().is_none());
    }

    #[test]
    fn engine_invalidation_keeps_listings() {
        let cache = Cache::new();
        cache.deployed_blocks.set(Vec::new());
        cache.engine_id.set(Some("42".to_string()));
        cache.listing("r1").set(Vec::new());

        cache.invalidate_engine();

        assert!(cache.deployed_blocks.peek().is_none());
        assert!(cache.engine_id.peek().is_none());
        assert!(cache.has_listing("r1"));

        cache.invalidate(CacheKey::Listing("r1".to_string()));
        assert!(!cache.has_listing("r1"));
    }

    #[test]
    fn readers_keep_their_snapshot_after_replacement() {
        let cache = Cache::new();
        let first = cache.deployed_blocks.set(Vec::new());
        cache.invalidate(CacheKey::DeployedBlocks);
        let second = cache
            .deployed_blocks
            .get_or_try_populate(|| {
                Ok(vec![DeployedBlock {
                    id: "pkg.Foo".to_string(),
                    name: "Foo".to_string(),
                    category: None,
                    description: String::new(),
                    custom: true,
                    extension: "ext".to_string(),
                    produces_output: None,
                }])
            })
            .unwrap();
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }
}
