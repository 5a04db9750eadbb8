//! In-process fan-out publisher.
//!
//! Uses a tokio broadcast channel: every subscriber sees every message sent
//! after it subscribed. With no subscribers the message is dropped.

use async_trait::async_trait;
use roster_core::RosterResult;
use tokio::sync::broadcast;
use tracing::debug;

use crate::publisher::{MessagePublisher, StreamMessage};

/// Default number of messages buffered per subscriber before it lags.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Publisher backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<StreamMessage>,
}

impl BroadcastPublisher {
    /// Create a publisher with the given per-subscriber capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every message published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

#[async_trait]
impl MessagePublisher for BroadcastPublisher {
    async fn publish(&self, topic: &str, partition: i32, payload: Vec<u8>) -> RosterResult<()> {
        let message = StreamMessage::new(topic, partition, payload);
        let message_id = message.message_id;
        match self.tx.send(message) {
            Ok(receivers) => {
                debug!(topic, partition, %message_id, receivers, "Broadcast message");
            }
            Err(_) => {
                debug!(topic, partition, %message_id, "No subscribers for message");
            }
        }
        Ok(())
    }

    async fn flush(&self) -> RosterResult<()> {
        Ok(())
    }
}
