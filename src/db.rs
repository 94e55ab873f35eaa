//! Database connection and pool management.
//!
//! Postgres in deployments, SQLite for tests and local runs. The pool is
//! created with retry and exponential backoff, then migrated and seeded.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::seeds::seed_providers;

const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {source}")]
    ConnectionFailed {
        #[from]
        source: sea_orm::DbErr,
    },
    #[error("Invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Open a connection pool, retrying transient failures.
///
/// ```no_run
/// use atmosphere::{config::AppConfig, db::init_pool};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::default();
///     let db = init_pool(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    if cfg.database_url.trim().is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "Database URL cannot be empty".to_string(),
        }
        .into());
    }

    let mut opt = ConnectOptions::new(&cfg.database_url);
    opt.max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let mut retry_delay = Duration::from_millis(100);
    let mut attempt = 1;
    loop {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                log::info!("Connected to database (attempt {})", attempt);
                return Ok(conn);
            }
            Err(e) if attempt >= MAX_CONNECT_ATTEMPTS => {
                log::error!(
                    "Failed to connect to database after {} attempts: {}",
                    attempt,
                    e
                );
                return Err(DatabaseError::ConnectionFailed { source: e }.into());
            }
            Err(e) => {
                log::warn!(
                    "Database connection attempt {} failed: {}, retrying in {:?}",
                    attempt,
                    e,
                    retry_delay
                );
                sleep(retry_delay).await;
                retry_delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Apply pending migrations and make sure the provider rows exist
pub async fn prepare(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to run database migrations")?;
    seed_providers(db).await.context("Failed to seed providers")?;
    Ok(())
}

/// Run `SELECT 1` against the pool.
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());
    db.query_one(stmt)
        .await
        .context("Database health check failed")?;
    Ok(())
}
