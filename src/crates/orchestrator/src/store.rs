//! State store contract and its SQLite implementation
//!
//! Every write the scheduler and the orchestrator rely on is a single
//! conditional statement (insert-or-ignore, monotonic upsert,
//! mark-processed-once), so concurrent callers converge without locks.

use crate::db::models::{
    ExecutionRecord, ExecutionSource, NewExecutionRecord, NewExecutionSource,
    OrchestrationRunRow, UpsertOutcome,
};
use crate::db::repositories::{
    ExecutionRecordRepository, ExecutionSourceRepository, OrchestrationRunRepository,
    PendingExecutionRepository, WatermarkRepository,
};
use crate::db::{DatabaseConnection, DbResult};
use crate::orchestration::OrchestrationRun;
use async_trait::async_trait;

/// Durable keyed storage shared by the orchestrator and the sync jobs
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write a run under its session id, replacing any prior record
    async fn save_run(&self, run: &OrchestrationRun) -> DbResult<()>;

    async fn get_run(&self, session_id: &str) -> DbResult<Option<OrchestrationRun>>;

    /// Write a discovered source only when it is newer than the store maximum
    async fn upsert_source_if_newer(&self, source: &NewExecutionSource) -> DbResult<UpsertOutcome>;

    /// Register (or re-activate) a source unconditionally
    async fn register_source(&self, source: &NewExecutionSource) -> DbResult<ExecutionSource>;

    async fn set_source_active(&self, source_id: &str, active: bool) -> DbResult<bool>;

    async fn get_source(&self, source_id: &str) -> DbResult<Option<ExecutionSource>>;

    async fn list_active_sources(&self) -> DbResult<Vec<ExecutionSource>>;

    /// Highest execution id already ingested for a source
    async fn high_water_mark(&self, source_id: &str) -> DbResult<Option<i64>>;

    /// Raise the high-water mark; lower values are ignored
    async fn advance_high_water_mark(&self, source_id: &str, execution_id: i64) -> DbResult<bool>;

    /// Insert a record unless its key exists; true when written
    async fn insert_record_if_absent(&self, record: &NewExecutionRecord) -> DbResult<bool>;

    async fn has_record(&self, source_id: &str, execution_id: i64) -> DbResult<bool>;

    /// Remember an execution that was not finished when collected
    async fn track_pending(&self, source_id: &str, execution_id: i64) -> DbResult<bool>;

    /// Tracked unfinished executions of a source, ascending
    async fn list_pending(&self, source_id: &str) -> DbResult<Vec<i64>>;

    async fn clear_pending(&self, source_id: &str, execution_id: i64) -> DbResult<bool>;

    /// Unprocessed records across all sources, at most `limit`
    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<ExecutionRecord>>;

    /// Flip processed to true with the trace id; false when already processed
    async fn mark_processed(
        &self,
        source_id: &str,
        execution_id: i64,
        trace_id: &str,
    ) -> DbResult<bool>;

    async fn count_unprocessed(&self) -> DbResult<i64>;

    async fn get_record(&self, source_id: &str, execution_id: i64)
        -> DbResult<Option<ExecutionRecord>>;

    async fn list_records(&self, source_id: &str) -> DbResult<Vec<ExecutionRecord>>;
}

/// SQLite-backed state store
#[derive(Clone)]
pub struct SqliteStateStore {
    db: DatabaseConnection,
}

impl SqliteStateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Private in-memory store with migrations applied
    pub async fn in_memory() -> DbResult<Self> {
        Ok(Self::new(DatabaseConnection::in_memory().await?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save_run(&self, run: &OrchestrationRun) -> DbResult<()> {
        let row = OrchestrationRunRow::from_run(run)?;
        OrchestrationRunRepository::upsert(self.db.pool(), &row).await?;
        Ok(())
    }

    async fn get_run(&self, session_id: &str) -> DbResult<Option<OrchestrationRun>> {
        OrchestrationRunRepository::get(self.db.pool(), session_id)
            .await?
            .map(OrchestrationRunRow::into_run)
            .transpose()
    }

    async fn upsert_source_if_newer(&self, source: &NewExecutionSource) -> DbResult<UpsertOutcome> {
        Ok(ExecutionSourceRepository::upsert_if_newer(self.db.pool(), source).await?)
    }

    async fn register_source(&self, source: &NewExecutionSource) -> DbResult<ExecutionSource> {
        Ok(ExecutionSourceRepository::register(self.db.pool(), source).await?)
    }

    async fn set_source_active(&self, source_id: &str, active: bool) -> DbResult<bool> {
        Ok(ExecutionSourceRepository::set_active(self.db.pool(), source_id, active).await?)
    }

    async fn get_source(&self, source_id: &str) -> DbResult<Option<ExecutionSource>> {
        Ok(ExecutionSourceRepository::get(self.db.pool(), source_id).await?)
    }

    async fn list_active_sources(&self) -> DbResult<Vec<ExecutionSource>> {
        Ok(ExecutionSourceRepository::list_active(self.db.pool()).await?)
    }

    async fn high_water_mark(&self, source_id: &str) -> DbResult<Option<i64>> {
        Ok(WatermarkRepository::get(self.db.pool(), source_id).await?)
    }

    async fn advance_high_water_mark(&self, source_id: &str, execution_id: i64) -> DbResult<bool> {
        Ok(WatermarkRepository::advance(self.db.pool(), source_id, execution_id).await?)
    }

    async fn insert_record_if_absent(&self, record: &NewExecutionRecord) -> DbResult<bool> {
        Ok(ExecutionRecordRepository::insert_if_absent(self.db.pool(), record).await?)
    }

    async fn has_record(&self, source_id: &str, execution_id: i64) -> DbResult<bool> {
        Ok(ExecutionRecordRepository::exists(self.db.pool(), source_id, execution_id).await?)
    }

    async fn track_pending(&self, source_id: &str, execution_id: i64) -> DbResult<bool> {
        Ok(PendingExecutionRepository::track(self.db.pool(), source_id, execution_id).await?)
    }

    async fn list_pending(&self, source_id: &str) -> DbResult<Vec<i64>> {
        Ok(PendingExecutionRepository::list(self.db.pool(), source_id).await?)
    }

    async fn clear_pending(&self, source_id: &str, execution_id: i64) -> DbResult<bool> {
        Ok(PendingExecutionRepository::clear(self.db.pool(), source_id, execution_id).await?)
    }

    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<ExecutionRecord>> {
        Ok(ExecutionRecordRepository::list_unprocessed(self.db.pool(), limit).await?)
    }

    async fn mark_processed(
        &self,
        source_id: &str,
        execution_id: i64,
        trace_id: &str,
    ) -> DbResult<bool> {
        Ok(
            ExecutionRecordRepository::mark_processed(self.db.pool(), source_id, execution_id, trace_id)
                .await?,
        )
    }

    async fn count_unprocessed(&self) -> DbResult<i64> {
        Ok(ExecutionRecordRepository::count_unprocessed(self.db.pool()).await?)
    }

    async fn get_record(
        &self,
        source_id: &str,
        execution_id: i64,
    ) -> DbResult<Option<ExecutionRecord>> {
        Ok(ExecutionRecordRepository::get(self.db.pool(), source_id, execution_id).await?)
    }

    async fn list_records(&self, source_id: &str) -> DbResult<Vec<ExecutionRecord>> {
        Ok(ExecutionRecordRepository::list_by_source(self.db.pool(), source_id).await?)
    }
}
