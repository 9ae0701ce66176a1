//! Error types for the companion daemon.
//!
//! [`DaemonError`] wraps every failure mode during startup and shutdown so
//! that `main` can propagate with `?`.

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: companion_core::ConfigError,
    },

    /// Database connection or migration failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying data layer error.
        #[from]
        source: companion_db::DbError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },

    /// Waiting for the shutdown signal or a background task failed.
    #[error("runtime error: {message}")]
    Runtime {
        /// Description of the failure.
        message: String,
    },
}
