//! Record store trait for the store of record.
//!
//! The record store is the authoritative backend: whatever it holds is the
//! canonical state of a `Person`. Every other backend is a projection of it.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use roster_core::{NameFilter, Person, RosterResult};

/// Lazy, finite, one-shot sequence of rows.
///
/// Restartable only by issuing the query again.
pub type PersonStream = BoxStream<'static, RosterResult<Person>>;

/// Store of record for `Person` rows.
///
/// Implementations open a short-lived session per call and never hold
/// cursor state between calls. Transport errors are surfaced unchanged.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Drop and recreate the person table. Destroys every existing row.
    async fn init_schema(&self) -> RosterResult<()>;

    /// Look up a single row. Absence is `Ok(None)`, not an error.
    async fn find_by_login(&self, login: &str) -> RosterResult<Option<Person>>;

    /// Stream every row, ordered by login.
    async fn find_all(&self) -> RosterResult<PersonStream>;

    /// Stream rows whose names match the filter's substring patterns.
    async fn search(&self, filter: &NameFilter) -> RosterResult<PersonStream>;

    /// Insert a new row. Fails with a constraint error if the login exists.
    async fn insert(&self, person: &Person) -> RosterResult<()>;

    /// Delete a row, returning whether it existed.
    async fn delete(&self, login: &str) -> RosterResult<bool>;
}

/// Drain a person stream into a vector, stopping at the first error.
pub async fn collect_people(stream: PersonStream) -> RosterResult<Vec<Person>> {
    stream.try_collect().await
}
