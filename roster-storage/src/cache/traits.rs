//! Lookup cache trait and statistics.

use async_trait::async_trait;
use roster_core::RosterResult;

/// Key/value cache fronting the record store for single-key reads.
///
/// Keys are logins and values are the JSON wire form of a person. The cache
/// is a derived projection of the record store and may be stale; callers
/// decide when to repopulate or evict.
///
/// A missing key is `Ok(None)`. Errors are reserved for backend failures.
#[async_trait]
pub trait LookupCache: Send + Sync {
    /// Insert or overwrite the value for `key`.
    async fn put(&self, key: &str, value: &str) -> RosterResult<()>;

    /// Fetch the value for `key`.
    async fn get(&self, key: &str) -> RosterResult<Option<String>>;

    /// Remove `key`. No-op when absent.
    async fn remove(&self, key: &str) -> RosterResult<()>;

    /// Remove every entry.
    async fn remove_all(&self) -> RosterResult<()>;

    /// Number of entries in this cache instance.
    async fn size(&self) -> RosterResult<u64>;

    /// Hit/miss counters and entry count.
    async fn stats(&self) -> RosterResult<CacheStats>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) -> RosterResult<()>;
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
