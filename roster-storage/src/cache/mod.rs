//! Lookup cache backends.
//!
//! The cache sits in front of the record store for single-key reads:
//!
//! ```text
//! read_through(login)
//!     |
//!     +--> LookupCache::get  --hit--> decode --> Person
//!     |
//!     +--miss--> RecordStore::find_by_login --> LookupCache::put --> Person
//! ```
//!
//! Bulk reads never go through the cache.

mod lmdb_backend;
mod memory;
mod traits;

pub use lmdb_backend::{LmdbCache, LmdbCacheError, PERSONS_DB};
pub use memory::MemoryCache;
pub use traits::{CacheStats, LookupCache};
