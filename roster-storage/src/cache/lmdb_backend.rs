//! LMDB-backed lookup cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep the cache in a
//! memory-mapped file, so entries survive process restarts and can be shared
//! by several processes on one host. Entries live in a named `persons`
//! database inside the environment directory.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get` and `size`
//! - Write transactions for `put`, `remove` and `remove_all`
//! - Statistics are tracked with atomic counters

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use roster_core::{CacheError, RosterError, RosterResult};

use super::traits::{CacheStats, LookupCache};

/// Name of the LMDB database holding cached persons.
pub const PERSONS_DB: &str = "persons";

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for RosterError {
    fn from(e: LmdbCacheError) -> Self {
        RosterError::Cache(CacheError::Backend {
            reason: e.to_string(),
        })
    }
}

fn txn_error(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed cache.
pub struct LmdbCache {
    env: Env,
    db: Database<Str, Str>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LmdbCache {
    /// Open (or create) the cache under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Str, Str> = env
            .create_database(&mut wtxn, Some(PERSONS_DB))
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "LMDB cache opened");

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn entry_count(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        self.db.len(&rtxn).map_err(txn_error)
    }
}

#[async_trait]
impl LookupCache for LmdbCache {
    async fn put(&self, key: &str, value: &str) -> RosterResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.put(&mut wtxn, key, value).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> RosterResult<Option<String>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let value = self
            .db
            .get(&rtxn, key)
            .map_err(txn_error)?
            .map(str::to_string);

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn remove(&self, key: &str) -> RosterResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.delete(&mut wtxn, key).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn remove_all(&self) -> RosterResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.clear(&mut wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn size(&self) -> RosterResult<u64> {
        Ok(self.entry_count()?)
    }

    async fn stats(&self) -> RosterResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entry_count()?,
        })
    }

    async fn close(&self) -> RosterResult<()> {
        self.env
            .force_sync()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (LmdbCache, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let cache = LmdbCache::open(temp_dir.path(), 10).expect("cache creation should succeed");
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (cache, _dir) = create_test_cache();
        cache.put("alice", r#"{"login":"alice"}"#).await.unwrap();

        let value = cache.get("alice").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"login":"alice"}"#));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (cache, _dir) = create_test_cache();
        assert_eq!(cache.get("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let (cache, _dir) = create_test_cache();
        cache.put("alice", "v1").await.unwrap();
        cache.put("alice", "v2").await.unwrap();

        assert_eq!(cache.size().await.unwrap(), 1);
        assert_eq!(cache.get("alice").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let (cache, _dir) = create_test_cache();
        cache.put("a", "1").await.unwrap();
        cache.put("b", "2").await.unwrap();
        cache.put("c", "3").await.unwrap();

        cache.remove("a").await.unwrap();
        cache.remove("missing").await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 2);

        cache.remove_all().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
        assert_eq!(cache.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stats() {
        let (cache, _dir) = create_test_cache();
        cache.put("a", "1").await.unwrap();
        cache.get("a").await.unwrap();
        cache.get("z").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = LmdbCache::open(temp_dir.path(), 10).unwrap();
            cache.put("alice", "persisted").await.unwrap();
            cache.close().await.unwrap();
        }

        let reopened = LmdbCache::open(temp_dir.path(), 10).unwrap();
        assert_eq!(
            reopened.get("alice").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[test]
    fn test_error_maps_to_cache_backend() {
        let err: RosterError = LmdbCacheError::Transaction("boom".to_string()).into();
        assert!(matches!(err, RosterError::Cache(CacheError::Backend { .. })));
    }
}
