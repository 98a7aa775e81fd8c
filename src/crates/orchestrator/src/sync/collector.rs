//! Execution collection job
//!
//! Per source: list recent executions, keep ids above the high-water mark,
//! fetch and store each one in ascending order. Ids already stored are not
//! fetched again. The mark follows the ids until the first transient
//! failure; from then on it stays put for the rest of the pass so the gap is
//! retried next tick. Unfinished executions do not hold the mark back: they
//! are tracked as pending and re-fetched by id on later passes until they
//! finish or disappear.

use super::{JobReport, SyncError, SyncJob};
use crate::db::models::NewExecutionRecord;
use crate::store::StateStore;
use async_trait::async_trait;
use connectors::{ExecutionSourceClient, ExecutionSummary};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Counters of one collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Active sources visited
    pub sources: usize,
    /// Records newly written
    pub inserted: usize,
    /// Records that were already stored
    pub duplicates: usize,
    /// Executions not finished yet
    pub pending: usize,
    /// Executions permanently unavailable (not found, non-numeric id)
    pub skipped: usize,
    /// Records that failed transiently and will be retried
    pub errored: usize,
    /// Sources whose listing or store access failed
    pub failed_sources: usize,
}

/// Ingests new executions of every active source
pub struct ExecutionCollector {
    client: Arc<dyn ExecutionSourceClient>,
    store: Arc<dyn StateStore>,
    page_limit: usize,
}

impl ExecutionCollector {
    pub fn new(
        client: Arc<dyn ExecutionSourceClient>,
        store: Arc<dyn StateStore>,
        page_limit: usize,
    ) -> Self {
        Self {
            client,
            store,
            page_limit,
        }
    }

    pub async fn collect(&self, cancel: &CancellationToken) -> Result<CollectionReport, SyncError> {
        let sources = self.store.list_active_sources().await?;
        let mut report = CollectionReport::default();

        for source in &sources {
            if cancel.is_cancelled() {
                break;
            }
            report.sources += 1;
            if let Err(err) = self.collect_source(&source.source_id, &mut report, cancel).await {
                warn!(source_id = %source.source_id, error = %err, "Failed to collect executions");
                report.failed_sources += 1;
            }
        }

        Ok(report)
    }

    /// Collect one source; errors returned here abort this source only
    pub async fn collect_source(
        &self,
        source_id: &str,
        report: &mut CollectionReport,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let summaries = self.client.list_executions(source_id, self.page_limit).await?;
        let mark = self.store.high_water_mark(source_id).await?;

        let mut candidates: Vec<(i64, ExecutionSummary)> = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match summary.numeric_id() {
                Some(id) if mark.map_or(true, |m| id > m) => candidates.push((id, summary)),
                Some(_) => {}
                None => {
                    warn!(source_id, execution_id = %summary.id, "Skipping non-numeric execution id");
                    report.skipped += 1;
                }
            }
        }
        candidates.sort_by_key(|(id, _)| *id);
        candidates.dedup_by_key(|(id, _)| *id);

        let mut frozen = false;
        for (id, summary) in &candidates {
            if cancel.is_cancelled() {
                break;
            }
            if self.store.has_record(source_id, *id).await? {
                report.duplicates += 1;
            } else if !summary.is_finished() {
                debug!(source_id, execution_id = id, "Execution still in progress");
                self.store.track_pending(source_id, *id).await?;
                report.pending += 1;
            } else {
                match self.ingest(source_id, *id, summary).await {
                    Ok(true) => report.inserted += 1,
                    Ok(false) => report.duplicates += 1,
                    Err(err) if err.is_permanent() => {
                        warn!(source_id, execution_id = id, error = %err, "Skipping unavailable execution");
                        report.skipped += 1;
                    }
                    Err(err) => {
                        warn!(source_id, execution_id = id, error = %err, "Failed to ingest execution");
                        report.errored += 1;
                        frozen = true;
                        continue;
                    }
                }
            }

            if !frozen {
                self.store.advance_high_water_mark(source_id, *id).await?;
            }
        }

        let listed: HashSet<i64> = candidates.iter().map(|(id, _)| *id).collect();
        for id in self.store.list_pending(source_id).await? {
            if cancel.is_cancelled() {
                break;
            }
            if self.store.has_record(source_id, id).await? {
                self.store.clear_pending(source_id, id).await?;
            } else if !listed.contains(&id) {
                self.revisit(source_id, id, report).await?;
            }
        }

        Ok(())
    }

    /// Re-fetch an execution that was unfinished on an earlier pass
    async fn revisit(
        &self,
        source_id: &str,
        execution_id: i64,
        report: &mut CollectionReport,
    ) -> Result<(), SyncError> {
        let detail = match self.client.get_execution_detail(&execution_id.to_string()).await {
            Ok(detail) => detail,
            Err(err) => {
                let err = SyncError::from(err);
                if err.is_permanent() {
                    warn!(source_id, execution_id, error = %err, "Pending execution is gone");
                    self.store.clear_pending(source_id, execution_id).await?;
                    report.skipped += 1;
                } else {
                    warn!(source_id, execution_id, error = %err, "Failed to re-check pending execution");
                    report.errored += 1;
                }
                return Ok(());
            }
        };

        let summary = ExecutionSummary {
            id: execution_id.to_string(),
            status: detail_status(&detail),
        };
        if !summary.is_finished() {
            report.pending += 1;
            return Ok(());
        }

        let record =
            NewExecutionRecord::from_detail(source_id, execution_id, summary.status.as_deref(), &detail);
        if self.store.insert_record_if_absent(&record).await? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
        self.store.clear_pending(source_id, execution_id).await?;
        Ok(())
    }

    async fn ingest(
        &self,
        source_id: &str,
        execution_id: i64,
        summary: &ExecutionSummary,
    ) -> Result<bool, SyncError> {
        let detail = self.client.get_execution_detail(&summary.id).await?;
        let record =
            NewExecutionRecord::from_detail(source_id, execution_id, summary.status.as_deref(), &detail);
        Ok(self.store.insert_record_if_absent(&record).await?)
    }
}

/// Status of an execution detail; older engines only report `finished`
fn detail_status(detail: &Value) -> Option<String> {
    match detail.get("status").and_then(Value::as_str) {
        Some(status) => Some(status.to_string()),
        None if detail.get("finished") == Some(&Value::Bool(false))
            && detail.get("stoppedAt").map_or(true, Value::is_null) =>
        {
            Some("running".to_string())
        }
        None => None,
    }
}

#[async_trait]
impl SyncJob for ExecutionCollector {
    fn name(&self) -> &'static str {
        "collect"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<JobReport, SyncError> {
        self.collect(cancel).await.map(JobReport::Collection)
    }
}
