//! ExecutionRecord repository for database operations

use crate::db::connection::{now, DatabasePool};
use crate::db::models::{ExecutionRecord, NewExecutionRecord};

/// Repository for stored executions
pub struct ExecutionRecordRepository;

impl ExecutionRecordRepository {
    /// Insert a record unless one with the same `(source_id, execution_id)` exists
    ///
    /// Returns true when a row was written. An existing record is never
    /// modified, so its processed flag survives re-collection.
    pub async fn insert_if_absent(
        pool: &DatabasePool,
        record: &NewExecutionRecord,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO execution_records (
                source_id, execution_id, status, mode, started_at, stopped_at,
                payload, processed, ingested_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&record.source_id)
        .bind(record.execution_id)
        .bind(&record.status)
        .bind(&record.mode)
        .bind(&record.started_at)
        .bind(&record.stopped_at)
        .bind(&record.payload)
        .bind(now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a record by its composite key
    pub async fn get(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
    ) -> Result<Option<ExecutionRecord>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionRecord>(
            "SELECT * FROM execution_records WHERE source_id = ? AND execution_id = ?",
        )
        .bind(source_id)
        .bind(execution_id)
        .fetch_optional(pool)
        .await
    }

    /// Whether a record with this key is stored, without loading its payload
    pub async fn exists(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM execution_records WHERE source_id = ? AND execution_id = ?",
        )
        .bind(source_id)
        .bind(execution_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.is_some())
    }

    /// List unprocessed records in `(source_id, execution_id)` order
    pub async fn list_unprocessed(
        pool: &DatabasePool,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionRecord>(
            "SELECT * FROM execution_records
             WHERE processed = 0
             ORDER BY source_id, execution_id
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// List every record of a source, oldest execution first
    pub async fn list_by_source(
        pool: &DatabasePool,
        source_id: &str,
    ) -> Result<Vec<ExecutionRecord>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionRecord>(
            "SELECT * FROM execution_records WHERE source_id = ? ORDER BY execution_id",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await
    }

    /// Flip the processed flag and attach the trace id
    ///
    /// Only an unprocessed record is updated; returns false when the record is
    /// missing or was already processed.
    pub async fn mark_processed(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
        trace_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE execution_records
             SET processed = 1, trace_id = ?, processed_at = ?
             WHERE source_id = ? AND execution_id = ? AND processed = 0",
        )
        .bind(trace_id)
        .bind(now())
        .bind(source_id)
        .bind(execution_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count unprocessed records
    pub async fn count_unprocessed(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM execution_records WHERE processed = 0")
                .fetch_one(pool)
                .await?;

        Ok(result.0)
    }
}
