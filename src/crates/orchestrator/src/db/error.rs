//! State store error type
//!
//! sqlx, migration and JSON column failures are folded into a handful of
//! kinds. The store never reports a missing row as an error; lookups
//! return `Option`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database could not be opened or the pool is gone
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A CHECK, UNIQUE or foreign key constraint rejected a write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A stored row does not map back to its model
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl DatabaseError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        DatabaseError::Corrupt(msg.into())
    }

    /// Whether retrying the same statement later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Unavailable(_) | DatabaseError::Query(_))
    }
}

pub type DbResult<T> = std::result::Result<T, DatabaseError>;

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation()
                    || db_err.is_check_violation()
                    || db_err.is_foreign_key_violation() =>
            {
                DatabaseError::Constraint(db_err.message().to_string())
            }
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::RowNotFound => DatabaseError::Corrupt(err.to_string()),
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => DatabaseError::Unavailable(err.to_string()),
            sqlx::Error::Migrate(migrate) => DatabaseError::Migration(migrate.to_string()),
            err => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Corrupt(format!("JSON column: {}", err))
    }
}
