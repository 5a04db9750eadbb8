//! Roster Repository - Person Record Access
//!
//! Keeps three backends consistent for the `Person` entity:
//!
//! - a relational store of record ([`roster_storage::RecordStore`])
//! - a lookup cache in front of it ([`roster_storage::LookupCache`])
//! - a change stream ([`roster_events::ChangeEmitter`])
//!
//! [`PersonRepository`] offers the primitives (store-only save and read,
//! cache-only put and read, publish) alongside the composed cache-aside read
//! (`read_through`) and write-through save (`save_through`). Consistency
//! across backends is best effort.
//!
//! ```ignore
//! let config = RosterConfig::from_env()?;
//! let backends = Backends::connect(&config)?;
//! let repo = backends.repository();
//!
//! repo.save_through(&Person::new("alice", "Alice", "Smith", 30)).await?;
//! let alice = repo.read_through("alice").await?;
//!
//! backends.shutdown().await?;
//! ```

mod backends;
mod config;
mod repository;
pub mod telemetry;

pub use backends::Backends;
pub use config::{CacheBackendKind, CacheSettings, RosterConfig};
pub use repository::{PersonRepository, WarmUpReport};

pub use roster_core::{NameFilter, Person, RosterError, RosterResult};
pub use roster_events::{ChangeEmitter, QueueConfig};
pub use roster_storage::{collect_people, DbConfig, PersonStream};
