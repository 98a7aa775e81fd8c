//! Executions that were still running when collection reached them

use crate::db::connection::{now, DatabasePool};

/// Repository for pending executions
pub struct PendingExecutionRepository;

impl PendingExecutionRepository {
    /// Remember an unfinished execution; true when it was not tracked yet
    pub async fn track(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO pending_executions (source_id, execution_id, first_seen_at)
             VALUES (?, ?, ?)",
        )
        .bind(source_id)
        .bind(execution_id)
        .bind(now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending ids of a source, oldest first
    pub async fn list(pool: &DatabasePool, source_id: &str) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT execution_id FROM pending_executions
             WHERE source_id = ? ORDER BY execution_id",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn clear(
        pool: &DatabasePool,
        source_id: &str,
        execution_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pending_executions WHERE source_id = ? AND execution_id = ?",
        )
        .bind(source_id)
        .bind(execution_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
