//! Database connection and pool management

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use startline_common::config::DatabaseConfig;
use startline_common::{Error, Result};
use tracing::info;

/// Database pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| Error::Config("Database path required".to_string()))?;

        info!(path = %path.display(), "Connecting to database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create an in-memory database pool, used by tests
    pub async fn connect_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Database(format!("Failed to parse options: {}", e)))?
            .foreign_keys(true);

        // a single connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrate_and_health_check() {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.health_check().await.unwrap();
    }
}
