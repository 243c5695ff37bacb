//! Postgres access for the loan book
//!
//! The schema lives in `migrations/`: `loans` with its `loan_status` enum,
//! `scheduled_payments` (one row per monthly interest entry, cascading with
//! the loan) and `payments` (recorded collections). Migrations are embedded
//! in the binary and applied at startup before the router is built.

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Pool sized by `DB_MAX_CONNECTIONS`. Every loan mutation holds one
/// connection for the length of its transaction.
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Connecting to database"
    );

    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))
}

/// Apply pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!(
        known = MIGRATOR.iter().count(),
        "Loan schema is up to date"
    );
    Ok(())
}

/// Round trip used by `GET /health`.
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|e| DbError::HealthCheckError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![20240101000000, 20240101000001]);
        assert!(MIGRATOR
            .iter()
            .all(|m| !m.sql.trim().is_empty()));
    }

    #[test]
    fn test_db_error_messages() {
        let err = DbError::HealthCheckError("timeout".to_string());
        assert_eq!(err.to_string(), "Database health check failed: timeout");
    }
}
