//! ExecutionSource repository for database operations

use crate::db::connection::{now, DatabasePool};
use crate::db::models::{ExecutionSource, NewExecutionSource, UpsertOutcome};

/// Repository for workflow sources
pub struct ExecutionSourceRepository;

impl ExecutionSourceRepository {
    /// Write a discovered source when it is newer than everything stored
    ///
    /// The row is inserted or overwritten only when its creation time is
    /// strictly greater than the store-wide maximum, or the table is empty.
    /// The comparison and the write are one statement, so concurrent
    /// discovery passes converge. The active flag of an existing row is
    /// never touched.
    pub async fn upsert_if_newer(
        pool: &DatabasePool,
        source: &NewExecutionSource,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let existed = Self::get(pool, &source.source_id).await?.is_some();
        let written_at = now();

        let result = sqlx::query(
            "INSERT INTO execution_sources
                (source_id, name, description, is_active, created_at, discovered_at, updated_at)
             SELECT ?1, ?2, ?3, 1, ?4, ?5, ?5
             WHERE NOT EXISTS (SELECT 1 FROM execution_sources)
                OR ?4 > (SELECT MAX(created_at) FROM execution_sources)
             ON CONFLICT(source_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
        )
        .bind(&source.source_id)
        .bind(&source.name)
        .bind(&source.description)
        .bind(source.created_at_text())
        .bind(&written_at)
        .execute(pool)
        .await?;

        Ok(match (result.rows_affected(), existed) {
            (0, true) => UpsertOutcome::Unchanged,
            (0, false) => UpsertOutcome::Rejected,
            (_, false) => UpsertOutcome::Inserted,
            (_, true) => UpsertOutcome::Updated,
        })
    }

    /// Register a source by hand, activating it
    ///
    /// Unlike discovery this is unconditional: name and description are
    /// replaced and the source is (re)activated.
    pub async fn register(
        pool: &DatabasePool,
        source: &NewExecutionSource,
    ) -> Result<ExecutionSource, sqlx::Error> {
        let written_at = now();
        sqlx::query_as::<_, ExecutionSource>(
            "INSERT INTO execution_sources
                (source_id, name, description, is_active, created_at, discovered_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)
             ON CONFLICT(source_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                is_active = 1,
                updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(&source.source_id)
        .bind(&source.name)
        .bind(&source.description)
        .bind(source.created_at_text())
        .bind(&written_at)
        .fetch_one(pool)
        .await
    }

    /// Get a source by id
    pub async fn get(
        pool: &DatabasePool,
        source_id: &str,
    ) -> Result<Option<ExecutionSource>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionSource>("SELECT * FROM execution_sources WHERE source_id = ?")
            .bind(source_id)
            .fetch_optional(pool)
            .await
    }

    /// List active sources
    pub async fn list_active(pool: &DatabasePool) -> Result<Vec<ExecutionSource>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionSource>(
            "SELECT * FROM execution_sources WHERE is_active = 1 ORDER BY source_id",
        )
        .fetch_all(pool)
        .await
    }

    /// Enable or disable collection for a source
    pub async fn set_active(
        pool: &DatabasePool,
        source_id: &str,
        active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE execution_sources SET is_active = ?, updated_at = ? WHERE source_id = ?",
        )
        .bind(active)
        .bind(now())
        .bind(source_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest creation time across all sources
    pub async fn max_created_at(pool: &DatabasePool) -> Result<Option<String>, sqlx::Error> {
        let result: (Option<String>,) =
            sqlx::query_as("SELECT MAX(created_at) FROM execution_sources")
                .fetch_one(pool)
                .await?;

        Ok(result.0)
    }

    /// Count stored sources
    pub async fn count(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM execution_sources")
            .fetch_one(pool)
            .await?;

        Ok(result.0)
    }
}
