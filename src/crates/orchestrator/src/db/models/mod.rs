//! Database models
//!
//! Row types for the state store. All timestamp fields are stored as
//! fixed-width RFC 3339 strings (TEXT in SQLite), see [`crate::db::timestamp`].

pub mod execution_record;
pub mod execution_source;
pub mod orchestration_run;

pub use execution_record::{ExecutionRecord, NewExecutionRecord};
pub use execution_source::{ExecutionSource, NewExecutionSource, UpsertOutcome};
pub use orchestration_run::OrchestrationRunRow;
