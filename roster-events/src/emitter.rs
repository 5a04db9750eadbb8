//! Person change emitter.

use std::sync::Arc;

use roster_core::{Person, RosterResult};
use tokio::sync::Mutex;

use crate::config::DEFAULT_TOPIC;
use crate::publisher::MessagePublisher;

/// Publishes a person snapshot to the change stream.
///
/// Each call serializes the person, hands it to the publisher and flushes
/// before returning, so a successful return means the record left the
/// process. Nothing is buffered across calls and nothing is retried.
///
/// Clones share one delivery lock, so the flush that reports a result for a
/// call only ever carries that call's record. Emitters built separately over
/// the same publisher do not share the lock; clone one emitter instead.
#[derive(Clone)]
pub struct ChangeEmitter {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
    partition: i32,
    delivery: Arc<Mutex<()>>,
}

impl ChangeEmitter {
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<String>, partition: i32) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            partition,
            delivery: Arc::new(Mutex::new(())),
        }
    }

    /// Emitter on the default `persons` topic, partition 0.
    pub fn with_defaults(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self::new(publisher, DEFAULT_TOPIC, 0)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// The underlying publisher, for flushing at shutdown.
    pub fn publisher(&self) -> &Arc<dyn MessagePublisher> {
        &self.publisher
    }

    /// Serialize `person` and deliver it to the configured topic and partition.
    pub async fn publish(&self, person: &Person) -> RosterResult<()> {
        let payload = person.to_json_bytes()?;
        let _delivery = self.delivery.lock().await;
        self.publisher
            .publish(&self.topic, self.partition, payload)
            .await?;
        self.publisher.flush().await
    }
}
