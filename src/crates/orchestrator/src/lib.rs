//! Multi-agent orchestration and workflow-execution trace sync
//!
//! This crate provides two cooperating services over one SQLite state store:
//!
//! - a fan-out orchestrator that sends a user request to a roster of remote
//!   agents in parallel and aggregates what comes back
//! - a sync pipeline that pulls executions from n8n, stores them
//!   idempotently and exports each one as a Langfuse trace
//!
//! Components are wired once through [`platform::Platform`].

pub mod config;
pub mod db;
pub mod orchestration;
pub mod platform;
pub mod store;
pub mod sync;
pub mod transform;

use thiserror::Error;

pub use config::AppConfig;
pub use orchestration::{AgentResult, AgentStatus, FanOutOrchestrator, OrchestrationRun, RunStatus};
pub use platform::{Components, JobKind, Platform};
pub use store::{SqliteStateStore, StateStore};
pub use sync::{JobReport, SyncError, SyncScheduler};

/// Errors that can reach the caller of the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request was rejected before any agent was called
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// State store failure
    #[error("Persistence failed: {0}")]
    Persistence(#[from] db::DatabaseError),

    /// Collaborator client failure outside a single agent call
    #[error("Client error: {0}")]
    Client(#[from] connectors::ClientError),

    /// Sync job failure
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
