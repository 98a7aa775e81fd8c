//! Source discovery job

use super::{JobReport, SyncError, SyncJob};
use crate::db::models::{NewExecutionSource, UpsertOutcome};
use crate::db::parse_timestamp;
use crate::store::StateStore;
use async_trait::async_trait;
use connectors::{ExecutionSourceClient, SourceSummary};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Counters of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Sources reported by the engine
    pub total: usize,
    /// Sources inserted into the store
    pub new: usize,
    /// Sources already known (updated or left as is)
    pub existing: usize,
    /// Sources never stored because they are not newer than the store
    pub rejected: usize,
    /// Observations that could not be parsed or stored
    pub errored: usize,
}

/// Stores active workflows whose creation time is newer than the store maximum
pub struct SourceDiscovery {
    client: Arc<dyn ExecutionSourceClient>,
    store: Arc<dyn StateStore>,
    page_limit: usize,
}

impl SourceDiscovery {
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

    /// Validate every listed source, then upsert them oldest first
    ///
    /// Each upsert compares against the store maximum, which rises as the
    /// batch is written. Writing in creation order keeps the result
    /// independent of the order the engine lists sources in.
    pub async fn discover(&self, cancel: &CancellationToken) -> Result<DiscoveryReport, SyncError> {
        let sources = self.client.list_active_sources(self.page_limit).await?;
        let mut report = DiscoveryReport {
            total: sources.len(),
            ..Default::default()
        };

        let mut observed = Vec::with_capacity(sources.len());
        for summary in &sources {
            match observation(summary) {
                Ok(source) => observed.push(source),
                Err(err) => {
                    warn!(source_id = %summary.id, error = %err, "Skipping source");
                    report.errored += 1;
                }
            }
        }
        // Stable, so equal timestamps keep listing order
        observed.sort_by_key(|source| source.created_at);

        for source in &observed {
            if cancel.is_cancelled() {
                break;
            }
            match self.store.upsert_source_if_newer(source).await {
                Ok(UpsertOutcome::Inserted) => report.new += 1,
                Ok(UpsertOutcome::Rejected) => {
                    debug!(source_id = %source.source_id, "Source not newer than store, ignored");
                    report.rejected += 1;
                }
                Ok(outcome) => {
                    debug!(source_id = %source.source_id, ?outcome, "Source already known");
                    report.existing += 1;
                }
                Err(err) => {
                    warn!(source_id = %source.source_id, error = %err, "Failed to store source");
                    report.errored += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Turn an engine listing entry into a storable source
fn observation(summary: &SourceSummary) -> Result<NewExecutionSource, SyncError> {
    let invalid = |reason: &str| SyncError::InvalidSource {
        source_id: summary.id.clone(),
        reason: reason.to_string(),
    };

    if summary.id.trim().is_empty() {
        return Err(invalid("empty id"));
    }
    let created_at = summary
        .created_at
        .as_deref()
        .ok_or_else(|| invalid("missing createdAt"))?;
    let created_at = parse_timestamp(created_at).ok_or_else(|| invalid("unparsable createdAt"))?;

    let mut source = NewExecutionSource::new(&summary.id, &summary.name, created_at);
    if let Some(description) = summary.description.as_deref().filter(|d| !d.is_empty()) {
        source = source.with_description(description);
    }
    Ok(source)
}

#[async_trait]
impl SyncJob for SourceDiscovery {
    fn name(&self) -> &'static str {
        "discover"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<JobReport, SyncError> {
        self.discover(cancel).await.map(JobReport::Discovery)
    }
}
