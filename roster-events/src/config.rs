//! Change stream configuration.
//!
//! Loaded from `ROSTER_QUEUE_*` environment variables with defaults suited to
//! local development (in-process broadcast, topic `persons`, partition 0).

use std::str::FromStr;
use std::time::Duration;

use roster_core::ConfigError;

/// Default topic for person change events.
pub const DEFAULT_TOPIC: &str = "persons";

/// Longest topic name a Kafka broker accepts.
pub const MAX_TOPIC_LEN: usize = 249;

/// Kafka topic names are limited to ASCII alphanumerics, `.`, `_` and `-`,
/// which also keeps them safe to place in a REST proxy URL path.
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LEN
        && topic != "."
        && topic != ".."
        && topic
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Which publisher carries change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// In-process tokio broadcast channel.
    Broadcast,
    /// Kafka REST proxy over HTTP.
    Rest,
}

impl FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(QueueBackend::Broadcast),
            "rest" => Ok(QueueBackend::Rest),
            other => Err(ConfigError::InvalidValue {
                field: "ROSTER_QUEUE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected broadcast or rest".to_string(),
            }),
        }
    }
}

/// Change stream configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// REST proxy base URL, e.g. `http://localhost:8082`. Required for `rest`.
    pub url: Option<String>,
    pub topic: String,
    pub partition: i32,
    /// HTTP request timeout for the REST proxy.
    pub timeout: Duration,
    /// Per-subscriber buffer for the broadcast backend.
    pub broadcast_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Broadcast,
            url: None,
            topic: DEFAULT_TOPIC.to_string(),
            partition: 0,
            timeout: Duration::from_secs(10),
            broadcast_capacity: crate::broadcast::DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails only when `ROSTER_QUEUE_BACKEND` names an unknown backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let backend = match std::env::var("ROSTER_QUEUE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.backend,
        };

        Ok(Self {
            backend,
            url: std::env::var("ROSTER_QUEUE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            topic: std::env::var("ROSTER_QUEUE_TOPIC").unwrap_or(defaults.topic),
            partition: std::env::var("ROSTER_QUEUE_PARTITION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.partition),
            timeout: std::env::var("ROSTER_QUEUE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            broadcast_capacity: defaults.broadcast_capacity,
        })
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "ROSTER_QUEUE_TOPIC".to_string(),
            });
        }
        if !is_valid_topic(&self.topic) {
            return Err(ConfigError::InvalidValue {
                field: "ROSTER_QUEUE_TOPIC".to_string(),
                value: self.topic.clone(),
                reason: "topic may only contain ASCII letters, digits, '.', '_' and '-'".to_string(),
            });
        }
        if self.partition < 0 {
            return Err(ConfigError::InvalidValue {
                field: "ROSTER_QUEUE_PARTITION".to_string(),
                value: self.partition.to_string(),
                reason: "partition must be non-negative".to_string(),
            });
        }
        if self.backend == QueueBackend::Rest && self.url.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "ROSTER_QUEUE_URL".to_string(),
            });
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "broadcast_capacity".to_string(),
                value: "0".to_string(),
                reason: "capacity must be positive".to_string(),
            });
        }
        Ok(())
    }
}
