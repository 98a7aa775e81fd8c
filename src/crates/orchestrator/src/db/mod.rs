//! Database module for the orchestrator
//!
//! Provides the SQLite connection, row models, repositories, and error
//! handling behind the state store.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{now, parse_timestamp, timestamp, DatabaseConnection, DatabasePool};
pub use error::{DatabaseError, DbResult};
