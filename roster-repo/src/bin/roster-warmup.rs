//! Cache warm-up job.
//!
//! Connects the configured backends, optionally recreates the person table,
//! copies every stored row into the lookup cache, reports the cache size and
//! shuts down. Requires `ROSTER_CACHE_BACKEND=lmdb`; an in-memory cache
//! would be discarded at exit.

use roster_repo::telemetry::{init_tracing, TelemetryConfig};
use roster_repo::{Backends, RosterConfig, RosterResult};

#[tokio::main]
async fn main() -> RosterResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = RosterConfig::from_env()?;
    config.validate_for_warm_up()?;
    let backends = Backends::connect(&config)?;
    let repo = backends.repository();

    let outcome = tokio::select! {
        result = async {
            if config.init_schema {
                tracing::warn!("Recreating person table; existing rows are dropped");
                repo.init_schema().await?;
            }
            let report = repo.warm_up_cache().await?;
            let size = repo.size_of_cache().await?;
            tracing::info!(
                entries = report.entries,
                elapsed_ms = report.elapsed.as_millis() as u64,
                cache_size = size,
                "Warm-up finished"
            );
            Ok::<_, roster_repo::RosterError>(())
        } => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, abandoning warm-up");
            Ok(())
        }
    };

    let shutdown = backends.shutdown().await;
    outcome?;
    shutdown
}
