pub mod orders;
pub mod users;
pub mod withdrawals;

use log::*;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::traits::StorageError;

pub async fn new_pool(url: &str, max_connections: u32) -> Result<PgPool, StorageError> {
    trace!("🗃️ Creating new database connection pool for {url}");
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| StorageError::StatementError(e.to_string()))?;
    info!("🗃️ Database migrations complete");
    Ok(())
}

/// Postgres signals every unique-constraint breach with SQLSTATE 23505.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().and_then(|db| db.code()).map(|code| code == "23505").unwrap_or(false)
}
