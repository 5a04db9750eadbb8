//! Roster Test Utilities
//!
//! Shared test infrastructure for the roster workspace:
//! - Proptest generators for persons and search fragments
//! - Fixtures with in-memory backends
//! - Fault-injecting wrappers around every backend
//! - Custom assertions for roster errors

// Re-export in-memory backends from their source crates
pub use roster_events::InMemoryPublisher;
pub use roster_storage::{MemoryCache, MemoryRecordStore};

// Re-export core types for convenience
pub use roster_core::{
    CacheError, NameFilter, Person, PublishError, RosterError, RosterResult, SerializationError,
    StoreError, ValidationError, MAX_LOGIN_LEN, MAX_NAME_LEN,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use roster_events::MessagePublisher;
use roster_storage::{CacheStats, LookupCache, PersonStream, RecordStore};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Shared on/off switch for a fault-injecting backend.
///
/// Clones share state, so a test can keep one handle after the wrapped
/// backend has been moved behind an `Arc<dyn ...>`.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Record store that fails every call with a connection error while its
/// switch is on.
pub struct FaultyRecordStore<S> {
    inner: S,
    switch: FaultSwitch,
}

impl<S: RecordStore> FaultyRecordStore<S> {
    pub fn new(inner: S, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }

    fn check(&self) -> RosterResult<()> {
        if self.switch.is_failing() {
            return Err(StoreError::Connection {
                reason: "injected fault: record store unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FaultyRecordStore<S> {
    async fn init_schema(&self) -> RosterResult<()> {
        self.check()?;
        self.inner.init_schema().await
    }

    async fn find_by_login(&self, login: &str) -> RosterResult<Option<Person>> {
        self.check()?;
        self.inner.find_by_login(login).await
    }

    async fn find_all(&self) -> RosterResult<PersonStream> {
        self.check()?;
        self.inner.find_all().await
    }

    async fn search(&self, filter: &NameFilter) -> RosterResult<PersonStream> {
        self.check()?;
        self.inner.search(filter).await
    }

    async fn insert(&self, person: &Person) -> RosterResult<()> {
        self.check()?;
        self.inner.insert(person).await
    }

    async fn delete(&self, login: &str) -> RosterResult<bool> {
        self.check()?;
        self.inner.delete(login).await
    }
}

/// Lookup cache that fails every call with a backend error while its switch
/// is on.
pub struct FaultyCache<C> {
    inner: C,
    switch: FaultSwitch,
}

impl<C: LookupCache> FaultyCache<C> {
    pub fn new(inner: C, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }

    fn check(&self) -> RosterResult<()> {
        if self.switch.is_failing() {
            return Err(CacheError::Backend {
                reason: "injected fault: cache unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl<C: LookupCache> LookupCache for FaultyCache<C> {
    async fn put(&self, key: &str, value: &str) -> RosterResult<()> {
        self.check()?;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> RosterResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> RosterResult<()> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn remove_all(&self) -> RosterResult<()> {
        self.check()?;
        self.inner.remove_all().await
    }

    async fn size(&self) -> RosterResult<u64> {
        self.check()?;
        self.inner.size().await
    }

    async fn stats(&self) -> RosterResult<CacheStats> {
        self.check()?;
        self.inner.stats().await
    }

    async fn close(&self) -> RosterResult<()> {
        self.inner.close().await
    }
}

/// Publisher that fails `publish` and `flush` with a connect error while its
/// switch is on.
pub struct FaultyPublisher<P> {
    inner: P,
    switch: FaultSwitch,
}

impl<P: MessagePublisher> FaultyPublisher<P> {
    pub fn new(inner: P, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }

    fn check(&self) -> RosterResult<()> {
        if self.switch.is_failing() {
            return Err(PublishError::Connect {
                endpoint: "injected".to_string(),
                reason: "injected fault: message stream unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl<P: MessagePublisher> MessagePublisher for FaultyPublisher<P> {
    async fn publish(&self, topic: &str, partition: i32, payload: Vec<u8>) -> RosterResult<()> {
        self.check()?;
        self.inner.publish(topic, partition, payload).await
    }

    async fn flush(&self) -> RosterResult<()> {
        self.check()?;
        self.inner.flush().await
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for roster types.

    use super::*;
    use proptest::prelude::*;

    /// A login that passes validation.
    pub fn arb_login() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_.]{0,29}"
    }

    /// A printable name, possibly empty, possibly containing LIKE wildcards.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "\\PC{0,32}"
    }

    /// A plain alphabetic name fragment for search patterns.
    pub fn arb_fragment() -> impl Strategy<Value = String> {
        "[A-Za-z]{0,4}"
    }

    pub fn arb_age() -> impl Strategy<Value = i32> {
        prop_oneof![0i32..130, any::<i32>()]
    }

    /// A person that passes validation.
    pub fn arb_person() -> impl Strategy<Value = Person> {
        (arb_login(), arb_name(), arb_name(), arb_age()).prop_map(
            |(login, first_name, last_name, age)| Person::new(login, first_name, last_name, age),
        )
    }

    /// Up to `max` persons with distinct logins.
    pub fn arb_people(max: usize) -> impl Strategy<Value = Vec<Person>> {
        prop::collection::btree_map(arb_login(), (arb_name(), arb_name(), arb_age()), 0..=max)
            .prop_map(|rows| {
                rows.into_iter()
                    .map(|(login, (first, last, age))| Person::new(login, first, last, age))
                    .collect()
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Well-known persons and in-memory backend sets.

    use super::*;

    pub fn alice() -> Person {
        Person::new("alice", "Alice", "Smith", 30)
    }

    pub fn bob() -> Person {
        Person::new("bob", "Bob", "Smithson", 40)
    }

    pub fn carol() -> Person {
        Person::new("carol", "Carol", "Jones", 25)
    }

    /// In-memory backends wrapped in fault injectors, each with its own
    /// switch. All switches start off.
    pub struct TestBackends {
        pub store: Arc<dyn RecordStore>,
        pub cache: Arc<dyn LookupCache>,
        pub publisher: Arc<dyn MessagePublisher>,
        pub records: MemoryRecordStore,
        pub entries: MemoryCache,
        pub delivered: Arc<InMemoryPublisher>,
        pub store_fault: FaultSwitch,
        pub cache_fault: FaultSwitch,
        pub publish_fault: FaultSwitch,
    }

    impl TestBackends {
        pub fn new() -> Self {
            let records = MemoryRecordStore::new();
            let entries = MemoryCache::new();
            let delivered = Arc::new(InMemoryPublisher::new());
            let store_fault = FaultSwitch::new();
            let cache_fault = FaultSwitch::new();
            let publish_fault = FaultSwitch::new();

            Self {
                store: Arc::new(FaultyRecordStore::new(records.clone(), store_fault.clone())),
                cache: Arc::new(FaultyCache::new(entries.clone(), cache_fault.clone())),
                publisher: Arc::new(FaultyPublisher::new(
                    SharedPublisher(delivered.clone()),
                    publish_fault.clone(),
                )),
                records,
                entries,
                delivered,
                store_fault,
                cache_fault,
                publish_fault,
            }
        }
    }

    impl Default for TestBackends {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Lets an `Arc<InMemoryPublisher>` be wrapped while the test keeps a
    /// handle for inspecting delivered messages.
    struct SharedPublisher(Arc<InMemoryPublisher>);

    #[async_trait]
    impl MessagePublisher for SharedPublisher {
        async fn publish(
            &self,
            topic: &str,
            partition: i32,
            payload: Vec<u8>,
        ) -> RosterResult<()> {
            self.0.publish(topic, partition, payload).await
        }

        async fn flush(&self) -> RosterResult<()> {
            self.0.flush().await
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for roster-specific error variants.

    use super::*;

    /// Assert that a RosterResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &RosterResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a RosterResult is a cache KeyNotFound error.
    #[track_caller]
    pub fn assert_cache_miss<T: std::fmt::Debug>(result: &RosterResult<T>) {
        match result {
            Err(e) if e.is_cache_miss() => {}
            other => panic!("Expected KeyNotFound cache error, got: {:?}", other),
        }
    }

    /// Assert that a RosterResult is a constraint violation.
    #[track_caller]
    pub fn assert_constraint_violation<T: std::fmt::Debug>(result: &RosterResult<T>) {
        match result {
            Err(e) if e.is_constraint_violation() => {}
            other => panic!("Expected Constraint error, got: {:?}", other),
        }
    }

    /// Assert that a RosterResult is a store connection failure.
    #[track_caller]
    pub fn assert_connection_failure<T: std::fmt::Debug>(result: &RosterResult<T>) {
        match result {
            Err(e) if e.is_connection_failure() => {}
            other => panic!("Expected Connection error, got: {:?}", other),
        }
    }

    /// Assert that a RosterResult is a cache backend error.
    #[track_caller]
    pub fn assert_cache_backend_error<T: std::fmt::Debug>(result: &RosterResult<T>) {
        match result {
            Err(RosterError::Cache(CacheError::Backend { .. })) => {}
            other => panic!("Expected cache Backend error, got: {:?}", other),
        }
    }

    /// Assert that a RosterResult is a publish error.
    #[track_caller]
    pub fn assert_publish_error<T: std::fmt::Debug>(result: &RosterResult<T>) {
        match result {
            Err(RosterError::Publish(_)) => {}
            other => panic!("Expected Publish error, got: {:?}", other),
        }
    }
}
