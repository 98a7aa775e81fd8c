//! ExecutionSource model for database persistence
//!
//! A source is one workflow on the execution engine whose executions are
//! synchronized into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::connection::{parse_timestamp, timestamp};

/// A workflow known to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionSource {
    /// Engine-side workflow id
    pub source_id: String,

    /// Workflow name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Whether executions of this source are collected
    pub is_active: bool,

    /// Creation time reported by the engine (ISO8601 string)
    pub created_at: String,

    /// First time the source was stored (ISO8601 string)
    pub discovered_at: String,

    /// Last time the row was written (ISO8601 string)
    pub updated_at: String,
}

impl ExecutionSource {
    /// Engine-reported creation time
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

/// A source observation to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecutionSource {
    pub source_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewExecutionSource {
    pub fn new(source_id: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            description: None,
            created_at,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Creation time formatted for storage
    pub fn created_at_text(&self) -> String {
        timestamp(self.created_at)
    }
}

/// Result of a monotonic source upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The source was not known and has been inserted
    Inserted,
    /// The source was known and has been overwritten
    Updated,
    /// The source is known but the observation was not newer; nothing changed
    Unchanged,
    /// The source is not known and was not newer than the store; not stored
    Rejected,
}
