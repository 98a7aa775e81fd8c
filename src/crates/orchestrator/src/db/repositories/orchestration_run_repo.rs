//! OrchestrationRun repository for database operations

use crate::db::connection::DatabasePool;
use crate::db::models::OrchestrationRunRow;

/// Repository for orchestration runs, keyed by session id
pub struct OrchestrationRunRepository;

impl OrchestrationRunRepository {
    /// Insert a run, replacing any prior row for the same session id
    pub async fn upsert(pool: &DatabasePool, row: &OrchestrationRunRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO orchestration_runs (
                session_id, user_id, message, status, agent_results, aggregated_response,
                error_message, execution_time_secs, started_at, completed_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                user_id = excluded.user_id,
                message = excluded.message,
                status = excluded.status,
                agent_results = excluded.agent_results,
                aggregated_response = excluded.aggregated_response,
                error_message = excluded.error_message,
                execution_time_secs = excluded.execution_time_secs,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
        )
        .bind(&row.session_id)
        .bind(&row.user_id)
        .bind(&row.message)
        .bind(&row.status)
        .bind(&row.agent_results)
        .bind(&row.aggregated_response)
        .bind(&row.error_message)
        .bind(row.execution_time_secs)
        .bind(&row.started_at)
        .bind(&row.completed_at)
        .bind(&row.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get a run by session id
    pub async fn get(
        pool: &DatabasePool,
        session_id: &str,
    ) -> Result<Option<OrchestrationRunRow>, sqlx::Error> {
        sqlx::query_as::<_, OrchestrationRunRow>(
            "SELECT * FROM orchestration_runs WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await
    }

    /// List the most recently written runs
    pub async fn list_recent(
        pool: &DatabasePool,
        limit: i64,
    ) -> Result<Vec<OrchestrationRunRow>, sqlx::Error> {
        sqlx::query_as::<_, OrchestrationRunRow>(
            "SELECT * FROM orchestration_runs ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Count runs by status
    pub async fn count_by_status(pool: &DatabasePool, status: &str) -> Result<i64, sqlx::Error> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orchestration_runs WHERE status = ?")
                .bind(status)
                .fetch_one(pool)
                .await?;

        Ok(result.0)
    }
}
