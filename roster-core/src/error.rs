//! Error types for roster operations

use thiserror::Error;

/// Record store (store of record) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection to record store failed: {reason}")]
    Connection { reason: String },

    #[error("Constraint violation for login {login}: {reason}")]
    Constraint { login: String, reason: String },

    #[error("Schema operation failed: {reason}")]
    Schema { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Lookup cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Key not found in cache: {key}")]
    KeyNotFound { key: String },

    #[error("Cache backend failure: {reason}")]
    Backend { reason: String },
}

/// Entity (de)serialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to encode person: {reason}")]
    Encode { reason: String },

    #[error("Malformed person payload: {reason}")]
    Decode { reason: String },
}

/// Change stream publishing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Publish to topic {topic} rejected with status {status}: {reason}")]
    Rejected {
        topic: String,
        status: u16,
        reason: String,
    },

    #[error("Flush failed: {reason}")]
    Flush { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Field {field} exceeds {max} characters (got {len})")]
    TooLong { field: String, max: usize, len: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all roster errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl RosterError {
    /// True when the lookup cache reported a missing key.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, RosterError::Cache(CacheError::KeyNotFound { .. }))
    }

    /// True when the record store rejected a write on a uniqueness constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, RosterError::Store(StoreError::Constraint { .. }))
    }

    /// True when the record store could not be reached.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, RosterError::Store(StoreError::Connection { .. }))
    }
}

/// Result type alias for roster operations.
pub type RosterResult<T> = Result<T, RosterError>;

// =============================================================================
// TESTS
// =============================================================================
