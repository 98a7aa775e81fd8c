//! Database connection management
//!
//! Opens the SQLite pool backing the state store and applies the embedded
//! migrations.

use crate::db::error::DbResult;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

/// Database connection wrapper
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: Arc<DatabasePool>,
}

impl DatabaseConnection {
    /// Open a database from a connection string
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string (e.g., "sqlite:state.db" or "sqlite::memory:")
    /// * `max_connections` - Maximum number of pooled connections
    ///
    /// The database file is created when missing. File databases use WAL so
    /// the scheduler jobs and orchestration runs can write concurrently.
    pub async fn connect(database_url: &str, max_connections: u32) -> DbResult<Self> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if in_memory {
            // The database lives only as long as one of its connections.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Open a private in-memory database with migrations applied
    ///
    /// A single connection is used so every query sees the same database.
    pub async fn in_memory() -> DbResult<Self> {
        let conn = Self::connect("sqlite::memory:", 1).await?;
        conn.run_migrations().await?;
        Ok(conn)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run migrations on the database
    pub async fn run_migrations(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Format a timestamp for storage.
///
/// Fixed-width UTC so that lexical order in SQL equals chronological order.
pub fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time formatted for storage.
pub fn now() -> String {
    timestamp(Utc::now())
}

/// Parse a stored timestamp.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
