//! Trace export job
//!
//! Records are exported one at a time with a fixed pause after every
//! attempt; the trace backend is rate limited.

use super::{JobReport, SyncError, SyncJob};
use crate::db::models::ExecutionRecord;
use crate::store::StateStore;
use crate::transform::{convert_record, TransformOptions};
use async_trait::async_trait;
use connectors::TraceSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters of one export pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub attempted: usize,
    pub exported: usize,
    /// Exported but marked by a concurrent pass first
    pub already_processed: usize,
    pub failed: usize,
}

/// Exports unprocessed records as traces
pub struct TraceExporter {
    store: Arc<dyn StateStore>,
    sink: Arc<dyn TraceSink>,
    options: TransformOptions,
    delay: Duration,
    batch_limit: Option<i64>,
}

impl TraceExporter {
    pub fn new(
        store: Arc<dyn StateStore>,
        sink: Arc<dyn TraceSink>,
        options: TransformOptions,
        delay: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            options,
            delay,
            batch_limit: None,
        }
    }

    /// Cap the records handled per pass
    pub fn with_batch_limit(mut self, limit: i64) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    pub async fn export(&self, cancel: &CancellationToken) -> Result<ExportReport, SyncError> {
        // SQLite treats a negative LIMIT as no limit
        let records = self.store.list_unprocessed(self.batch_limit.unwrap_or(-1)).await?;
        let mut report = ExportReport::default();

        for record in &records {
            if cancel.is_cancelled() {
                break;
            }
            report.attempted += 1;

            match self.export_record(record).await {
                Ok(true) => report.exported += 1,
                Ok(false) => report.already_processed += 1,
                Err(err) => {
                    warn!(
                        source_id = %record.source_id,
                        execution_id = record.execution_id,
                        error = %err,
                        "Failed to export trace"
                    );
                    report.failed += 1;
                }
            }

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        Ok(report)
    }

    /// Convert, export and mark one record; false when it was marked already
    pub async fn export_record(&self, record: &ExecutionRecord) -> Result<bool, SyncError> {
        let trace = convert_record(record, &self.options)?;
        debug!(
            source_id = %record.source_id,
            execution_id = record.execution_id,
            spans = trace.spans.len(),
            generations = trace.generation_count(),
            "Exporting trace"
        );

        let trace_id = self.sink.export(&trace).await?;
        let marked = self
            .store
            .mark_processed(&record.source_id, record.execution_id, &trace_id)
            .await?;

        if marked {
            info!(
                source_id = %record.source_id,
                execution_id = record.execution_id,
                trace_id = %trace_id,
                "Trace exported"
            );
        }
        Ok(marked)
    }
}

#[async_trait]
impl SyncJob for TraceExporter {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<JobReport, SyncError> {
        self.export(cancel).await.map(JobReport::Export)
    }
}
