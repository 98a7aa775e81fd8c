//! Per-source high-water mark of ingested execution ids

use crate::db::connection::{now, DatabasePool};

/// Repository for source watermarks
pub struct WatermarkRepository;

impl WatermarkRepository {
    /// Highest execution id recorded for a source
    pub async fn get(pool: &DatabasePool, source_id: &str) -> Result<Option<i64>, sqlx::Error> {
        let result: Option<(i64,)> = sqlx::query_as(
            "SELECT last_execution_id FROM source_watermarks WHERE source_id = ?",
        )
        .bind(source_id)
        .fetch_optional(pool)
        .await?;

        Ok(result.map(|r| r.0))
    }

    /// Raise the mark to `execution_id`; a lower or equal value is ignored
    ///
    /// Returns true when the stored mark changed.
    pub async fn advance(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO source_watermarks (source_id, last_execution_id, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(source_id) DO UPDATE SET
                last_execution_id = excluded.last_execution_id,
                updated_at = excluded.updated_at
             WHERE excluded.last_execution_id > source_watermarks.last_execution_id",
        )
        .bind(source_id)
        .bind(execution_id)
        .bind(now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
