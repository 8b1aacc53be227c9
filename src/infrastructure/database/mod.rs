//! PostgreSQL connection management and repository.

mod postgres_repository;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

pub use postgres_repository::{create_postgres_repository, PostgresRepository};

/// Delay between connection attempts during startup.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Opens the connection pool, retrying while the database comes up.
///
/// # Errors
/// Returns the last connection error once `retry_count` attempts are exhausted.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let options = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);

        match options.connect(&config.database_url).await {
            Ok(pool) => {
                tracing::info!("Database connection pool established (attempt {})", attempt);
                return Ok(pool);
            }
            Err(err) if attempt < config.retry_count => {
                tracing::warn!(
                    "Database not ready (attempt {}/{}): {}",
                    attempt,
                    config.retry_count,
                    err
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => {
                return Err(err).context(format!(
                    "Failed to connect to database after {attempt} attempts"
                ));
            }
        }
    }
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    // ---
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(())
}
