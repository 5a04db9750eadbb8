//! Message publisher trait and the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_core::RosterResult;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A single record handed to a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Unique id assigned when the record is published (UUIDv7, time-ordered).
    pub message_id: Uuid,
    pub topic: String,
    pub partition: i32,
    pub payload: Vec<u8>,
    pub published_at: DateTime<Utc>,
}

impl StreamMessage {
    pub fn new(topic: impl Into<String>, partition: i32, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            topic: topic.into(),
            partition,
            payload,
            published_at: Utc::now(),
        }
    }
}

/// Client for an external message stream.
///
/// `publish` may buffer; `flush` forces every buffered record out and
/// reports delivery failure. Records whose flush failed are not retried.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Hand a record to the publisher.
    async fn publish(&self, topic: &str, partition: i32, payload: Vec<u8>) -> RosterResult<()>;

    /// Deliver every buffered record.
    async fn flush(&self) -> RosterResult<()>;
}

/// Publisher that keeps delivered messages in memory.
///
/// Records are buffered on `publish` and become visible through
/// [`InMemoryPublisher::delivered`] once flushed.
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    pending: Mutex<Vec<StreamMessage>>,
    delivered: Mutex<Vec<StreamMessage>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, in publish order.
    pub async fn delivered(&self) -> Vec<StreamMessage> {
        self.delivered.lock().await.clone()
    }

    /// Number of records published but not yet flushed.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Forget every delivered message.
    pub async fn clear(&self) {
        self.delivered.lock().await.clear();
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, partition: i32, payload: Vec<u8>) -> RosterResult<()> {
        self.pending
            .lock()
            .await
            .push(StreamMessage::new(topic, partition, payload));
        Ok(())
    }

    async fn flush(&self) -> RosterResult<()> {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        self.delivered.lock().await.extend(batch);
        Ok(())
    }
}
