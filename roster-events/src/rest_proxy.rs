//! Kafka REST proxy publisher.
//!
//! Records are buffered on `publish` and sent on `flush` as one produce
//! request per topic:
//!
//! ```text
//! POST {base_url}/topics/{topic}
//! Content-Type: application/vnd.kafka.binary.v2+json
//!
//! {"records":[{"partition":0,"value":"<base64 payload>"}]}
//! ```
//!
//! The buffer is taken before sending, so a failed flush drops its records.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use roster_core::{PublishError, RosterResult, SerializationError};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::is_valid_topic;
use crate::publisher::{MessagePublisher, StreamMessage};

/// Content type for binary-valued produce requests.
pub const KAFKA_BINARY_V2: &str = "application/vnd.kafka.binary.v2+json";

const KAFKA_V2_ACCEPT: &str = "application/vnd.kafka.v2+json";

#[derive(Debug, Serialize)]
struct ProduceRecord {
    partition: i32,
    value: String,
}

#[derive(Debug, Serialize)]
struct ProduceRequest {
    records: Vec<ProduceRecord>,
}

/// Encode a batch of messages as a produce request body.
fn produce_body(messages: &[StreamMessage]) -> RosterResult<Vec<u8>> {
    let request = ProduceRequest {
        records: messages
            .iter()
            .map(|m| ProduceRecord {
                partition: m.partition,
                value: STANDARD.encode(&m.payload),
            })
            .collect(),
    };
    serde_json::to_vec(&request).map_err(|e| {
        SerializationError::Encode {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Split messages into per-topic batches, keeping first-seen topic order and
/// publish order within each topic.
fn group_by_topic(messages: Vec<StreamMessage>) -> Vec<(String, Vec<StreamMessage>)> {
    let mut batches: Vec<(String, Vec<StreamMessage>)> = Vec::new();
    for message in messages {
        match batches.iter_mut().find(|(topic, _)| *topic == message.topic) {
            Some((_, batch)) => batch.push(message),
            None => batches.push((message.topic.clone(), vec![message])),
        }
    }
    batches
}

/// Publisher that produces to Kafka through a REST proxy.
pub struct RestProxyPublisher {
    base_url: String,
    client: reqwest::Client,
    buffer: Mutex<Vec<StreamMessage>>,
}

impl RestProxyPublisher {
    /// Create a publisher for the proxy at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RosterResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Connect {
                endpoint: base_url.clone(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url,
            client,
            buffer: Mutex::new(Vec::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of records waiting for the next flush.
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.base_url, topic)
    }

    async fn send_batch(&self, topic: &str, batch: &[StreamMessage]) -> RosterResult<()> {
        let url = self.topic_url(topic);
        let body = produce_body(batch)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, KAFKA_BINARY_V2)
            .header(ACCEPT, KAFKA_V2_ACCEPT)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "REST proxy request failed");
                PublishError::Connect {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            tracing::warn!(topic, status = %status, "REST proxy rejected produce request");
            return Err(PublishError::Rejected {
                topic: topic.to_string(),
                status: status.as_u16(),
                reason,
            }
            .into());
        }

        tracing::debug!(topic, records = batch.len(), "Produced records");
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for RestProxyPublisher {
    async fn publish(&self, topic: &str, partition: i32, payload: Vec<u8>) -> RosterResult<()> {
        if !is_valid_topic(topic) {
            return Err(PublishError::Rejected {
                topic: topic.to_string(),
                status: 400,
                reason: "invalid topic name".to_string(),
            }
            .into());
        }
        self.buffer
            .lock()
            .await
            .push(StreamMessage::new(topic, partition, payload));
        Ok(())
    }

    async fn flush(&self) -> RosterResult<()> {
        let pending = std::mem::take(&mut *self.buffer.lock().await);
        if pending.is_empty() {
            return Ok(());
        }

        for (topic, batch) in group_by_topic(pending) {
            self.send_batch(&topic, &batch).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::RosterError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one HTTP request, answer with `status_line`, and hand back the
    /// raw request text.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                status_line
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_produce_body_shape() {
        let messages = vec![
            StreamMessage::new("persons", 0, b"{\"login\":\"a\"}".to_vec()),
            StreamMessage::new("persons", 2, b"x".to_vec()),
        ];
        let body: serde_json::Value =
            serde_json::from_slice(&produce_body(&messages).unwrap()).unwrap();

        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["partition"], 0);
        assert_eq!(records[0]["value"], STANDARD.encode(b"{\"login\":\"a\"}"));
        assert_eq!(records[1]["partition"], 2);
        assert_eq!(records[1]["value"], "eA==");
    }

    #[test]
    fn test_group_by_topic_keeps_order() {
        let messages = vec![
            StreamMessage::new("a", 0, vec![1]),
            StreamMessage::new("b", 0, vec![2]),
            StreamMessage::new("a", 0, vec![3]),
        ];
        let batches = group_by_topic(messages);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "a");
        assert_eq!(
            batches[0].1.iter().map(|m| m.payload[0]).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(batches[1].0, "b");
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash_trimmed() {
        let publisher =
            RestProxyPublisher::new("http://proxy:8082/", Duration::from_secs(1)).unwrap();
        assert_eq!(publisher.base_url(), "http://proxy:8082");
        assert_eq!(publisher.topic_url("persons"), "http://proxy:8082/topics/persons");
    }

    #[tokio::test]
    async fn test_flush_posts_buffered_records() {
        let (url, server) = one_shot_server("200 OK").await;
        let publisher = RestProxyPublisher::new(url, Duration::from_secs(5)).unwrap();

        publisher.publish("persons", 0, b"hello".to_vec()).await.unwrap();
        assert_eq!(publisher.buffered().await, 1);
        publisher.flush().await.unwrap();
        assert_eq!(publisher.buffered().await, 0);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /topics/persons HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/vnd.kafka.binary.v2+json"));
        assert!(request.contains(&STANDARD.encode(b"hello")));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let (url, server) = one_shot_server("422 Unprocessable Entity").await;
        let publisher = RestProxyPublisher::new(url, Duration::from_secs(5)).unwrap();

        publisher.publish("persons", 0, b"x".to_vec()).await.unwrap();
        let err = publisher.flush().await.unwrap_err();
        assert!(matches!(
            err,
            RosterError::Publish(PublishError::Rejected { status: 422, .. })
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_connect_error_and_drops_records() {
        let publisher =
            RestProxyPublisher::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();

        publisher.publish("persons", 0, b"x".to_vec()).await.unwrap();
        let err = publisher.flush().await.unwrap_err();
        assert!(matches!(
            err,
            RosterError::Publish(PublishError::Connect { .. })
        ));
        assert_eq!(publisher.buffered().await, 0);
    }

    #[tokio::test]
    async fn test_topic_outside_url_safe_charset_is_refused() {
        let publisher =
            RestProxyPublisher::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();

        let err = publisher
            .publish("people/changes?x=1", 0, b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RosterError::Publish(PublishError::Rejected { status: 400, .. })
        ));
        assert_eq!(publisher.buffered().await, 0);
    }

    #[tokio::test]
    async fn test_flush_with_empty_buffer_sends_nothing() {
        let publisher =
            RestProxyPublisher::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        publisher.flush().await.unwrap();
    }
}
