//! Roster Events - Change Stream
//!
//! Emits person snapshots to an external message stream. The
//! [`ChangeEmitter`] serializes and flushes; a [`MessagePublisher`] carries
//! the bytes. Publishers provided here:
//!
//! - [`InMemoryPublisher`]: records messages for tests and local runs
//! - [`BroadcastPublisher`]: in-process fan-out over a tokio broadcast channel
//! - [`RestProxyPublisher`]: Kafka via a REST proxy
//!
//! Delivery is at most once.

mod broadcast;
mod config;
mod emitter;
mod publisher;
mod rest_proxy;

use std::sync::Arc;

use roster_core::RosterResult;

pub use broadcast::{BroadcastPublisher, DEFAULT_BROADCAST_CAPACITY};
pub use config::{is_valid_topic, QueueBackend, QueueConfig, DEFAULT_TOPIC, MAX_TOPIC_LEN};
pub use emitter::ChangeEmitter;
pub use publisher::{InMemoryPublisher, MessagePublisher, StreamMessage};
pub use rest_proxy::{RestProxyPublisher, KAFKA_BINARY_V2};

/// Build the publisher selected by `config`.
pub fn publisher_from_config(config: &QueueConfig) -> RosterResult<Arc<dyn MessagePublisher>> {
    config.validate()?;
    match config.backend {
        QueueBackend::Broadcast => Ok(Arc::new(BroadcastPublisher::new(
            config.broadcast_capacity,
        ))),
        QueueBackend::Rest => {
            let url = config.url.clone().unwrap_or_default();
            Ok(Arc::new(RestProxyPublisher::new(url, config.timeout)?))
        }
    }
}

/// Build the emitter selected by `config`.
pub fn emitter_from_config(config: &QueueConfig) -> RosterResult<ChangeEmitter> {
    let publisher = publisher_from_config(config)?;
    Ok(ChangeEmitter::new(publisher, config.topic.clone(), config.partition))
}
