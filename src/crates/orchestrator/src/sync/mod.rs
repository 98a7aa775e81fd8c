//! Execution synchronization pipeline
//!
//! Three jobs share the state store and tick independently:
//!
//! - [`SourceDiscovery`] stores workflows that are newer than anything known
//! - [`ExecutionCollector`] ingests new executions above each source's high-water mark
//! - [`TraceExporter`] converts unprocessed records and exports them as traces
//!
//! Ticks of the same or different jobs may overlap. Every store write they
//! issue is idempotent, so no job takes a lock.

pub mod collector;
pub mod discovery;
pub mod exporter;
pub mod scheduler;

pub use collector::{CollectionReport, ExecutionCollector};
pub use discovery::{DiscoveryReport, SourceDiscovery};
pub use exporter::{ExportReport, TraceExporter};
pub use scheduler::{JobSchedule, SyncScheduler};

use crate::db::DatabaseError;
use crate::transform::TransformError;
use async_trait::async_trait;
use connectors::ClientError;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors of one job pass or one item inside it
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Upstream call failed: {0}")]
    Client(#[from] ClientError),

    #[error("State store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid source {source_id}: {reason}")]
    InvalidSource { source_id: String, reason: String },

    #[error("Scheduler is already running")]
    AlreadyRunning,
}

impl SyncError {
    /// Errors that will not go away on retry
    pub fn is_permanent(&self) -> bool {
        match self {
            SyncError::Client(err) => err.is_not_found(),
            SyncError::InvalidSource { .. } | SyncError::Transform(_) => true,
            _ => false,
        }
    }
}

/// Counters produced by one job pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Discovery(DiscoveryReport),
    Collection(CollectionReport),
    Export(ExportReport),
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobReport::Discovery(r) => write!(
                f,
                "total={} new={} existing={} rejected={} errored={}",
                r.total, r.new, r.existing, r.rejected, r.errored
            ),
            JobReport::Collection(r) => write!(
                f,
                "sources={} inserted={} duplicates={} pending={} skipped={} errored={} failed_sources={}",
                r.sources, r.inserted, r.duplicates, r.pending, r.skipped, r.errored, r.failed_sources
            ),
            JobReport::Export(r) => write!(
                f,
                "attempted={} exported={} already_processed={} failed={}",
                r.attempted, r.exported, r.already_processed, r.failed
            ),
        }
    }
}

/// One recurring pipeline step
#[async_trait]
pub trait SyncJob: Send + Sync {
    /// Short name used in logs and on the command line
    fn name(&self) -> &'static str;

    /// Run one pass; cancellation is checked between items
    async fn run(&self, cancel: &CancellationToken) -> Result<JobReport, SyncError>;
}
