//! In-memory record store.
//!
//! Mirrors the SQL store's semantics (primary key on login, LIKE search,
//! destructive schema init) so the repository can be exercised without a
//! database.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use roster_core::{NameFilter, Person, RosterResult, StoreError};

use crate::record::{PersonStream, RecordStore};

/// In-memory record store for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<BTreeMap<String, Person>>>,
}

impl MemoryRecordStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    fn snapshot<F>(&self, keep: F) -> RosterResult<Vec<Person>>
    where
        F: Fn(&Person) -> bool,
    {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows.values().filter(|p| keep(p)).cloned().collect())
    }
}

fn into_stream(people: Vec<Person>) -> PersonStream {
    stream::iter(people.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn init_schema(&self) -> RosterResult<()> {
        self.rows
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }

    async fn find_by_login(&self, login: &str) -> RosterResult<Option<Person>> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows.get(login).cloned())
    }

    async fn find_all(&self) -> RosterResult<PersonStream> {
        Ok(into_stream(self.snapshot(|_| true)?))
    }

    async fn search(&self, filter: &NameFilter) -> RosterResult<PersonStream> {
        Ok(into_stream(self.snapshot(|p| filter.matches(p))?))
    }

    async fn insert(&self, person: &Person) -> RosterResult<()> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        if rows.contains_key(&person.login) {
            return Err(StoreError::Constraint {
                login: person.login.clone(),
                reason: "duplicate key value violates primary key".to_string(),
            }
            .into());
        }
        rows.insert(person.login.clone(), person.clone());
        Ok(())
    }

    async fn delete(&self, login: &str) -> RosterResult<bool> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows.remove(login).is_some())
    }
}
