//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` (from
//! `RUST_LOG`) and either a JSON or a human-readable fmt layer.

use roster_core::{ConfigError, RosterResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "roster_repo=debug,roster_storage=info,info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "roster".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Read `ROSTER_LOG_FORMAT` (`json` or `pretty`, default `json`).
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("ROSTER_SERVICE_NAME")
                .unwrap_or_else(|_| "roster".to_string()),
            format: std::env::var("ROSTER_LOG_FORMAT")
                .map(|v| parse_format(&v))
                .unwrap_or(LogFormat::Json),
        }
    }
}

fn parse_format(raw: &str) -> LogFormat {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => LogFormat::Pretty,
        _ => LogFormat::Json,
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> RosterResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ConfigError::InvalidValue {
        field: "tracing subscriber".to_string(),
        value: config.service_name.clone(),
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(
        service_name = %config.service_name,
        format = ?config.format,
        "Tracing initialized"
    );
    Ok(())
}
