//! Person repository.
//!
//! Composes the record store, the lookup cache and the change emitter. The
//! record store is canonical; the cache is a derived projection that this
//! type populates and evicts but never reconciles on its own. No operation
//! spans stores atomically: a multi-store write that fails part way leaves
//! the earlier steps committed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use roster_core::{CacheError, NameFilter, Person, RosterResult};
use roster_events::ChangeEmitter;
use roster_storage::{LookupCache, PersonStream, RecordStore};
use tracing::{debug, info, warn};

/// Outcome of a cache warm-up pass.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmUpReport {
    /// Number of cache puts performed.
    pub entries: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Cache-aside / write-through access to `Person` records.
///
/// Holds only its three collaborator handles; clones share them.
#[derive(Clone)]
pub struct PersonRepository {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn LookupCache>,
    emitter: ChangeEmitter,
}

impl PersonRepository {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn LookupCache>,
        emitter: ChangeEmitter,
    ) -> Self {
        Self {
            store,
            cache,
            emitter,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn LookupCache> {
        &self.cache
    }

    pub fn emitter(&self) -> &ChangeEmitter {
        &self.emitter
    }

    // ========================================================================
    // SCHEMA
    // ========================================================================

    /// Drop and recreate the person table. Destroys every stored row; the
    /// cache is left as is.
    #[tracing::instrument(skip(self))]
    pub async fn init_schema(&self) -> RosterResult<()> {
        self.store.init_schema().await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert a new person into the record store.
    ///
    /// Create-only: a second save with the same login fails with a
    /// constraint error and the first row is kept. The cache and the change
    /// stream are not touched, so a cached entry for this login stays as it
    /// was until the caller refreshes or evicts it.
    #[tracing::instrument(skip(self, person), fields(login = %person.login))]
    pub async fn save(&self, person: &Person) -> RosterResult<()> {
        person.validate()?;
        self.store.insert(person).await?;
        debug!("Person inserted");
        Ok(())
    }

    /// Insert, then cache, then publish.
    ///
    /// Each step runs only if the previous one succeeded. A failure is
    /// returned as is; earlier steps are not rolled back.
    #[tracing::instrument(skip(self, person), fields(login = %person.login))]
    pub async fn save_through(&self, person: &Person) -> RosterResult<()> {
        person.validate()?;
        self.store.insert(person).await?;

        if let Err(e) = self.save_to_cache(person).await {
            warn!(error = %e, "Row committed but cache put failed");
            return Err(e);
        }

        if let Err(e) = self.emitter.publish(person).await {
            warn!(error = %e, "Row committed and cached but change event not delivered");
            return Err(e);
        }

        debug!("Person written through");
        Ok(())
    }

    /// Put the JSON form of `person` into the cache under its login.
    #[tracing::instrument(skip(self, person), fields(login = %person.login))]
    pub async fn save_to_cache(&self, person: &Person) -> RosterResult<()> {
        let value = person.to_json()?;
        self.cache.put(&person.login, &value).await
    }

    /// Emit a change event carrying `person`.
    #[tracing::instrument(skip(self, person), fields(login = %person.login))]
    pub async fn publish(&self, person: &Person) -> RosterResult<()> {
        self.emitter.publish(person).await
    }

    /// Delete a row, then evict its cache entry. Returns whether the row
    /// existed. No change event is emitted.
    ///
    /// A warm-up that read its snapshot before the delete and writes the row
    /// after the eviction puts the deleted row back into the cache. That
    /// entry stays until the next `evict` or `clear_cache`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, login: &str) -> RosterResult<bool> {
        let existed = self.store.delete(login).await?;
        if let Err(e) = self.cache.remove(login).await {
            warn!(error = %e, "Row deleted but cache eviction failed");
            return Err(e);
        }
        Ok(existed)
    }

    // ========================================================================
    // SINGLE-KEY READS
    // ========================================================================

    /// Read from the record store only.
    #[tracing::instrument(skip(self))]
    pub async fn read_by_login(&self, login: &str) -> RosterResult<Option<Person>> {
        self.store.find_by_login(login).await
    }

    /// Read from the cache only. A miss is a `KeyNotFound` cache error; the
    /// record store is never consulted.
    #[tracing::instrument(skip(self))]
    pub async fn read_from_cache_by_login(&self, login: &str) -> RosterResult<Person> {
        match self.cache.get(login).await? {
            Some(raw) => {
                debug!("Cache hit");
                Person::from_json(&raw)
            }
            None => {
                debug!("Cache miss");
                Err(CacheError::KeyNotFound {
                    key: login.to_string(),
                }
                .into())
            }
        }
    }

    /// Cache-aside read: cache first, record store on a miss, populating the
    /// cache when the row exists.
    ///
    /// Cache backend failures and undecodable cached values are returned
    /// rather than treated as misses.
    #[tracing::instrument(skip(self))]
    pub async fn read_through(&self, login: &str) -> RosterResult<Option<Person>> {
        if let Some(raw) = self.cache.get(login).await? {
            debug!("Cache hit");
            return Person::from_json(&raw).map(Some);
        }

        debug!("Cache miss, reading record store");
        match self.store.find_by_login(login).await? {
            Some(person) => {
                self.save_to_cache(&person).await?;
                Ok(Some(person))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // BULK READS (never cached)
    // ========================================================================

    /// Stream every row from the record store.
    #[tracing::instrument(skip(self))]
    pub async fn read_all(&self) -> RosterResult<PersonStream> {
        self.store.find_all().await
    }

    /// Stream rows whose first and last names contain the given fragments.
    /// An absent or empty fragment matches every row.
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> RosterResult<PersonStream> {
        self.store
            .search(&NameFilter::new(first_name, last_name))
            .await
    }

    // ========================================================================
    // CACHE MAINTENANCE
    // ========================================================================

    /// Copy every stored row into the cache.
    ///
    /// Overwrites existing entries and removes nothing, so entries for rows
    /// deleted from the store survive. Writes made concurrently may or may
    /// not be picked up.
    #[tracing::instrument(skip(self))]
    pub async fn warm_up_cache(&self) -> RosterResult<WarmUpReport> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut rows = self.store.find_all().await?;
        let mut entries = 0u64;
        while let Some(person) = rows.try_next().await? {
            self.save_to_cache(&person).await?;
            entries += 1;
        }

        let report = WarmUpReport {
            entries,
            started_at,
            finished_at: Utc::now(),
            elapsed: clock.elapsed(),
        };
        info!(
            entries = report.entries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cache warm-up complete"
        );
        Ok(report)
    }

    /// Number of entries in the cache.
    pub async fn size_of_cache(&self) -> RosterResult<u64> {
        self.cache.size().await
    }

    /// Remove one cache entry.
    #[tracing::instrument(skip(self))]
    pub async fn evict(&self, login: &str) -> RosterResult<()> {
        self.cache.remove(login).await
    }

    /// Remove every cache entry.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cache(&self) -> RosterResult<()> {
        self.cache.remove_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{RosterError, SerializationError, ValidationError};
    use roster_events::InMemoryPublisher;
    use roster_storage::{collect_people, MemoryCache, MemoryRecordStore};

    struct Harness {
        repo: PersonRepository,
        store: MemoryRecordStore,
        cache: MemoryCache,
        publisher: Arc<InMemoryPublisher>,
    }

    fn harness() -> Harness {
        let store = MemoryRecordStore::new();
        let cache = MemoryCache::new();
        let publisher = Arc::new(InMemoryPublisher::new());
        let repo = PersonRepository::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            ChangeEmitter::with_defaults(publisher.clone()),
        );
        Harness {
            repo,
            store,
            cache,
            publisher,
        }
    }

    fn alice() -> Person {
        Person::new("alice", "Alice", "Smith", 30)
    }

    #[tokio::test]
    async fn test_save_touches_only_the_store() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();

        assert_eq!(h.store.row_count(), 1);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 0);
        assert!(h.publisher.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_person() {
        let h = harness();
        let err = h.repo.save(&Person::new("", "A", "B", 1)).await.unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError::RequiredFieldMissing { .. })
        ));
        assert_eq!(h.store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_save_through_reaches_every_backend() {
        let h = harness();
        h.repo.save_through(&alice()).await.unwrap();

        assert_eq!(h.repo.read_by_login("alice").await.unwrap(), Some(alice()));
        assert_eq!(
            h.repo.read_from_cache_by_login("alice").await.unwrap(),
            alice()
        );
        let delivered = h.publisher.delivered().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(Person::from_json_bytes(&delivered[0].payload).unwrap(), alice());
    }

    #[tokio::test]
    async fn test_save_through_duplicate_stops_before_cache() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();

        let err = h.repo.save_through(&alice()).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 0);
        assert!(h.publisher.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_only_read_miss_is_key_not_found() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();

        let err = h.repo.read_from_cache_by_login("alice").await.unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[tokio::test]
    async fn test_read_through_populates_cache() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();

        assert_eq!(h.repo.read_through("alice").await.unwrap(), Some(alice()));
        assert_eq!(
            h.repo.read_from_cache_by_login("alice").await.unwrap(),
            alice()
        );
    }

    #[tokio::test]
    async fn test_read_through_absent_does_not_cache() {
        let h = harness();
        assert_eq!(h.repo.read_through("ghost").await.unwrap(), None);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_through_prefers_cache_even_when_stale() {
        let h = harness();
        let cached = Person::new("alice", "Cached", "Copy", 99);
        h.repo.save_to_cache(&cached).await.unwrap();
        h.repo.save(&alice()).await.unwrap();

        assert_eq!(h.repo.read_through("alice").await.unwrap(), Some(cached));
    }

    #[tokio::test]
    async fn test_malformed_cache_entry_is_serialization_error() {
        let h = harness();
        h.cache.put("alice", "{not json").await.unwrap();

        assert!(matches!(
            h.repo.read_through("alice").await,
            Err(RosterError::Serialization(SerializationError::Decode { .. }))
        ));
        assert!(matches!(
            h.repo.read_from_cache_by_login("alice").await,
            Err(RosterError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_cache_entry() {
        let h = harness();
        h.repo.save_through(&alice()).await.unwrap();

        assert!(h.repo.delete("alice").await.unwrap());
        assert_eq!(h.repo.read_by_login("alice").await.unwrap(), None);
        assert!(h
            .repo
            .read_from_cache_by_login("alice")
            .await
            .unwrap_err()
            .is_cache_miss());
        assert!(!h.repo.delete("alice").await.unwrap());
        assert_eq!(h.publisher.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_warm_up_reports_entries() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();
        h.repo
            .save(&Person::new("bob", "Bob", "Smithson", 40))
            .await
            .unwrap();

        let report = h.repo.warm_up_cache().await.unwrap();
        assert_eq!(report.entries, 2);
        assert!(report.finished_at >= report.started_at);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_warm_up_keeps_entries_for_deleted_rows() {
        let h = harness();
        h.repo.save_to_cache(&alice()).await.unwrap();

        let report = h.repo.warm_up_cache().await.unwrap();
        assert_eq!(report.entries, 0);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_evict_and_clear_cache() {
        let h = harness();
        h.repo.save_to_cache(&alice()).await.unwrap();
        h.repo
            .save_to_cache(&Person::new("bob", "Bob", "Smithson", 40))
            .await
            .unwrap();

        h.repo.evict("alice").await.unwrap();
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 1);

        h.repo.clear_cache().await.unwrap();
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bulk_reads_bypass_cache() {
        let h = harness();
        h.repo.save(&alice()).await.unwrap();

        let all = collect_people(h.repo.read_all().await.unwrap()).await.unwrap();
        let found = collect_people(h.repo.search(Some("Ali"), None).await.unwrap())
            .await
            .unwrap();

        assert_eq!(all, vec![alice()]);
        assert_eq!(found, vec![alice()]);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_init_schema_leaves_cache_alone() {
        let h = harness();
        h.repo.save_through(&alice()).await.unwrap();

        h.repo.init_schema().await.unwrap();
        assert_eq!(h.store.row_count(), 0);
        assert_eq!(h.repo.size_of_cache().await.unwrap(), 1);
    }
}
