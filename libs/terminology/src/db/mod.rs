//! Database layer - storage backends and data access

pub mod memory;
pub mod terminology;
pub mod traits;

pub use memory::{InMemoryResourceStore, InMemoryTerminologyStore};
pub use terminology::{PostgresTerminologyStore, PostgresTerminologyTransaction};
pub use traits::{ResourceStore, TerminologyStore, TerminologyTransaction};

use crate::{config::DatabaseConfig, Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Migrations for the terminology tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool and, if configured, bring the schema up to date
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let statement_timeout = config.statement_timeout_seconds;
    let lock_timeout = config.lock_timeout_seconds;

    let pool = PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if statement_timeout > 0 {
                    sqlx::query(&format!("SET statement_timeout = '{statement_timeout}s'"))
                        .execute(&mut *conn)
                        .await?;
                }
                if lock_timeout > 0 {
                    sqlx::query(&format!("SET lock_timeout = '{lock_timeout}s'"))
                        .execute(&mut *conn)
                        .await?;
                }
                Ok(())
            })
        })
        .connect(&config.url)
        .await
        .map_err(Error::Database)?;

    if config.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Terminology migrations applied");
    }

    Ok(pool)
}
