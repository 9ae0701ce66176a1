//! Companion service daemon.
//!
//! Wires the companion service to `PostgreSQL` and keeps records current in
//! the background until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `companion-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Build the companion service over the database store
//! 5. Spawn the sweep loop and the chat eviction loop
//! 6. Wait for Ctrl-C, signal shutdown and drain both loops

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use companion_core::config::LoggingConfig;
use companion_core::sweep::{run_chat_eviction_loop, run_sweep_loop};
use companion_core::{CompanionConfig, CompanionService, LogFormat, SystemClock};
use companion_db::{PgCompanionStore, PostgresPool};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

/// Config file used when neither an argument nor `COMPANION_CONFIG` is given.
const DEFAULT_CONFIG_PATH: &str = "companion-config.yaml";

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration.
    let config_path = resolve_config_path(
        std::env::args().nth(1),
        std::env::var("COMPANION_CONFIG").ok(),
    );
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        config = %config_path.display(),
        sweep_interval_secs = config.sweep.interval_secs,
        sweep_concurrency = config.sweep.concurrency,
        chat_retention_hours = config.sweep.chat_retention_hours,
        "companion-daemon starting"
    );

    // 3. Connect to PostgreSQL and migrate.
    let pool = PostgresPool::open(&config.infrastructure).await?;

    // 4. Build the service.
    let store = PgCompanionStore::new(&pool);
    let service = Arc::new(CompanionService::new(
        store,
        Arc::new(SystemClock),
        config.engine.clone(),
        &config.sweep,
    ));

    // 5. Background loops.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = tokio::spawn(run_sweep_loop(
        Arc::clone(&service),
        config.sweep.interval(),
        shutdown_rx.clone(),
    ));
    let eviction = tokio::spawn(run_chat_eviction_loop(
        Arc::clone(&service),
        config.sweep.chat_eviction_interval(),
        shutdown_rx,
    ));

    // 6. Wait for Ctrl-C.
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DaemonError::Runtime {
            message: format!("failed to listen for Ctrl-C: {e}"),
        })?;
    info!("Shutdown signal received");

    if shutdown_tx.send(true).is_err() {
        warn!("background loops already stopped");
    }
    let sweep_result = sweep.await.map_err(|e| DaemonError::Runtime {
        message: format!("sweep loop panicked: {e}"),
    })?;
    let evicted = eviction.await.map_err(|e| DaemonError::Runtime {
        message: format!("chat eviction loop panicked: {e}"),
    })?;

    pool.close().await;
    info!(
        sweep_passes = sweep_result.passes,
        advanced = sweep_result.totals.advanced,
        failed = sweep_result.totals.failed,
        chats_evicted = evicted,
        "companion-daemon shutdown complete"
    );

    Ok(())
}

/// Pick the config file: first CLI argument, then `COMPANION_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`].
fn resolve_config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the configuration, falling back to defaults when the file is absent.
///
/// Environment overrides apply in both cases.
fn load_config(path: &std::path::Path) -> Result<CompanionConfig, DaemonError> {
    if path.exists() {
        Ok(CompanionConfig::from_file(path)?)
    } else {
        let mut config = CompanionConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) -> Result<(), DaemonError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| DaemonError::Logging {
            message: format!("invalid log filter {:?}: {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| DaemonError::Logging {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn argument_beats_environment() {
        let path = resolve_config_path(Some("a.yaml".to_owned()), Some("b.yaml".to_owned()));
        assert_eq!(path, PathBuf::from("a.yaml"));
    }

    #[test]
    fn environment_used_without_argument() {
        let path = resolve_config_path(None, Some("b.yaml".to_owned()));
        assert_eq!(path, PathBuf::from("b.yaml"));
    }

    #[test]
    fn default_path_when_unset() {
        assert_eq!(
            resolve_config_path(None, None),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(std::path::Path::new("/nonexistent/companion.yaml")).unwrap();
        assert_eq!(config.engine, CompanionConfig::default().engine);
        assert_eq!(config.sweep, CompanionConfig::default().sweep);
    }
}
