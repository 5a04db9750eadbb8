//! Roster Storage - Record Store and Lookup Cache Backends
//!
//! The store of record (`RecordStore`) with PostgreSQL and in-memory
//! implementations, and the `LookupCache` that fronts it with in-memory and
//! LMDB implementations.

pub mod cache;
mod memory;
mod postgres;
mod record;

pub use cache::{CacheStats, LmdbCache, LmdbCacheError, LookupCache, MemoryCache};
pub use memory::MemoryRecordStore;
pub use postgres::{DbConfig, PgRecordStore, PgSessionFactory, Session, PERSON_TABLE};
pub use record::{collect_people, PersonStream, RecordStore};
