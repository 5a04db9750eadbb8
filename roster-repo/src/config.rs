//! Runtime configuration.
//!
//! Every setting comes from environment variables with development defaults.
//! `from_env` fails only on values that cannot be interpreted at all;
//! cross-field checks live in `validate`.

use std::path::PathBuf;
use std::str::FromStr;

use roster_core::{ConfigError, RosterResult};
use roster_events::QueueConfig;
use roster_storage::DbConfig;

// ============================================================================
// CACHE SETTINGS
// ============================================================================

/// Which lookup cache backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Process-local concurrent map.
    Memory,
    /// Memory-mapped LMDB environment on local disk.
    Lmdb,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            other => Err(ConfigError::InvalidValue {
                field: "ROSTER_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected memory or lmdb".to_string(),
            }),
        }
    }
}

/// Lookup cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    /// LMDB environment directory.
    pub path: PathBuf,
    /// LMDB map size in megabytes.
    pub max_size_mb: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            path: PathBuf::from("./data/roster-cache"),
            max_size_mb: 256,
        }
    }
}

impl CacheSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let backend = match std::env::var("ROSTER_CACHE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.backend,
        };

        Ok(Self {
            backend,
            path: std::env::var("ROSTER_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: std::env::var("ROSTER_CACHE_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size_mb),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == CacheBackendKind::Lmdb {
            if self.path.as_os_str().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "ROSTER_CACHE_PATH".to_string(),
                });
            }
            if self.max_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "ROSTER_CACHE_MAX_SIZE_MB".to_string(),
                    value: "0".to_string(),
                    reason: "map size must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// ROSTER CONFIGURATION
// ============================================================================

/// Complete configuration for the record-access layer.
#[derive(Debug, Clone, Default)]
pub struct RosterConfig {
    pub db: DbConfig,
    pub cache: CacheSettings,
    pub queue: QueueConfig,
    /// Recreate the person table at startup (`ROSTER_INIT_SCHEMA=true`).
    /// Destroys existing rows.
    pub init_schema: bool,
}

impl RosterConfig {
    pub fn from_env() -> RosterResult<Self> {
        Ok(Self {
            db: DbConfig::from_env(),
            cache: CacheSettings::from_env()?,
            queue: QueueConfig::from_env()?,
            init_schema: std::env::var("ROSTER_INIT_SCHEMA")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        })
    }

    pub fn validate(&self) -> RosterResult<()> {
        if self.db.host.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "ROSTER_DB_HOST".to_string(),
            }
            .into());
        }
        if self.db.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ROSTER_DB_POOL_SIZE".to_string(),
                value: "0".to_string(),
                reason: "pool size must be positive".to_string(),
            }
            .into());
        }
        self.cache.validate()?;
        self.queue.validate()?;
        Ok(())
    }

    /// `validate`, plus the checks for a standalone warm-up run. The cache
    /// must outlive the process, so the in-memory backend is refused.
    pub fn validate_for_warm_up(&self) -> RosterResult<()> {
        self.validate()?;
        if self.cache.backend == CacheBackendKind::Memory {
            return Err(ConfigError::InvalidValue {
                field: "ROSTER_CACHE_BACKEND".to_string(),
                value: "memory".to_string(),
                reason: "a warm-up run needs a persistent cache; set ROSTER_CACHE_BACKEND=lmdb"
                    .to_string(),
            }
            .into());
        }
        Ok(())
    }
}
