//! Backend bootstrap and teardown.
//!
//! One set of backend handles is created per process and shared by every
//! repository built from it.

use std::sync::Arc;

use roster_core::RosterResult;
use roster_events::{emitter_from_config, ChangeEmitter, InMemoryPublisher, MessagePublisher};
use roster_storage::{
    LmdbCache, LookupCache, MemoryCache, MemoryRecordStore, PgRecordStore, PgSessionFactory,
    RecordStore,
};
use tracing::{info, warn};

use crate::config::{CacheBackendKind, CacheSettings, RosterConfig};
use crate::repository::PersonRepository;

/// Shared backend handles with an explicit lifecycle.
pub struct Backends {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn LookupCache>,
    emitter: ChangeEmitter,
    sessions: Option<PgSessionFactory>,
}

impl Backends {
    /// Build the PostgreSQL pools, the configured cache and the configured
    /// publisher. Database connections are opened lazily on first use.
    pub fn connect(config: &RosterConfig) -> RosterResult<Self> {
        config.validate()?;

        let pg = PgRecordStore::from_config(&config.db)?;
        let sessions = pg.sessions().clone();
        let cache = open_cache(&config.cache)?;
        let emitter = emitter_from_config(&config.queue)?;

        info!(
            db_host = %config.db.host,
            read_replica = config.db.read_host.is_some(),
            cache = ?config.cache.backend,
            queue = ?config.queue.backend,
            topic = %config.queue.topic,
            "Backends connected"
        );

        Ok(Self {
            store: Arc::new(pg),
            cache,
            emitter,
            sessions: Some(sessions),
        })
    }

    /// Fully in-process backends for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryRecordStore::new()),
            cache: Arc::new(MemoryCache::new()),
            emitter: ChangeEmitter::with_defaults(Arc::new(InMemoryPublisher::new())),
            sessions: None,
        }
    }

    /// Assemble from existing handles.
    pub fn from_parts(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn LookupCache>,
        emitter: ChangeEmitter,
    ) -> Self {
        Self {
            store,
            cache,
            emitter,
            sessions: None,
        }
    }

    /// A repository sharing these handles.
    pub fn repository(&self) -> PersonRepository {
        PersonRepository::new(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.emitter.clone(),
        )
    }

    /// Flush the publisher, close the cache and close the session pools.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub async fn shutdown(self) -> RosterResult<()> {
        let mut first_error = None;

        if let Err(e) = self.emitter.publisher().flush().await {
            warn!(error = %e, "Publisher flush failed during shutdown");
            first_error.get_or_insert(e);
        }

        if let Err(e) = self.cache.close().await {
            warn!(error = %e, "Cache close failed during shutdown");
            first_error.get_or_insert(e);
        }

        if let Some(sessions) = &self.sessions {
            sessions.close();
        }

        info!("Backends shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn open_cache(settings: &CacheSettings) -> RosterResult<Arc<dyn LookupCache>> {
    match settings.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::new())),
        CacheBackendKind::Lmdb => Ok(Arc::new(LmdbCache::open(
            &settings.path,
            settings.max_size_mb,
        )?)),
    }
}
