//! Connection pool for the companion database.
//!
//! Pool size and timeouts come from the `infrastructure` section of
//! `companion-config.yaml`. Queries are built at runtime rather than checked
//! at compile time, so the workspace builds without a live database.

use companion_core::config::InfrastructureConfig;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::DbError;

/// Reported to the server as `application_name`.
const APPLICATION_NAME: &str = "companion";

/// Pool sizing and timeouts for `infra`.
fn pool_options(infra: &InfrastructureConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(infra.max_connections)
        .acquire_timeout(infra.connect_timeout())
        .idle_timeout(infra.idle_timeout())
}

/// Parse `infra.postgres_url` into connect options.
fn connect_options(infra: &InfrastructureConfig) -> Result<PgConnectOptions, DbError> {
    let options: PgConnectOptions = infra
        .postgres_url
        .parse()
        .map_err(|e: sqlx::Error| DbError::Config(format!("invalid postgres_url: {e}")))?;
    Ok(options.application_name(APPLICATION_NAME))
}

/// Shared handle to the companion database.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Open a pool as configured by `infra`.
    ///
    /// # Errors
    ///
    /// [`DbError::Config`] for an unparsable URL, [`DbError::Postgres`] when
    /// the server cannot be reached.
    pub async fn connect(infra: &InfrastructureConfig) -> Result<Self, DbError> {
        let options = connect_options(infra)?;
        let host = options.get_host().to_owned();
        let database = options.get_database().map(str::to_owned);

        let pool = pool_options(infra).connect_with(options).await?;
        tracing::info!(
            host,
            database = database.as_deref().unwrap_or("<default>"),
            max_connections = infra.max_connections,
            "Connected to companion database"
        );
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// See [`PostgresPool::connect`] and [`PostgresPool::run_migrations`].
    pub async fn open(infra: &InfrastructureConfig) -> Result<Self, DbError> {
        let pool = Self::connect(infra).await?;
        pool.run_migrations().await?;
        Ok(pool)
    }

    /// Apply pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Companion schema up to date");
        Ok(())
    }

    /// The underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Companion database pool closed");
    }
}
