//! In-process cache backed by a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use roster_core::RosterResult;

use super::traits::{CacheStats, LookupCache};

/// Shared in-memory cache.
///
/// Clones share the same entries and counters, so one instance can be handed
/// to every caller in the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, String>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LookupCache for MemoryCache {
    async fn put(&self, key: &str, value: &str) -> RosterResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> RosterResult<Option<String>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value().clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &str) -> RosterResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn remove_all(&self) -> RosterResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn size(&self) -> RosterResult<u64> {
        Ok(self.entries.len() as u64)
    }

    async fn stats(&self) -> RosterResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        })
    }

    async fn close(&self) -> RosterResult<()> {
        Ok(())
    }
}
