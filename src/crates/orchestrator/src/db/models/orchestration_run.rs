//! OrchestrationRun row for database persistence

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::connection::{parse_timestamp, timestamp};
use crate::db::error::{DatabaseError, DbResult};
use crate::orchestration::{OrchestrationRun, RunStatus};

/// Stored form of an orchestration run
///
/// Agent results are kept as a JSON array; timestamps as ISO8601 strings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrchestrationRunRow {
    pub session_id: String,
    pub user_id: Option<String>,
    pub message: String,
    /// running, completed or failed
    pub status: String,
    /// JSON array of agent results
    pub agent_results: String,
    pub aggregated_response: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_secs: Option<f64>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

impl OrchestrationRunRow {
    /// Convert a run into its stored form
    pub fn from_run(run: &OrchestrationRun) -> DbResult<Self> {
        Ok(Self {
            session_id: run.session_id.clone(),
            user_id: run.user_id.clone(),
            message: run.message.clone(),
            status: run.status.as_str().to_string(),
            agent_results: serde_json::to_string(&run.agent_results)?,
            aggregated_response: run.aggregated_response.clone(),
            error_message: run.error_message.clone(),
            execution_time_secs: Some(run.execution_time_secs),
            started_at: timestamp(run.started_at),
            completed_at: run.completed_at.map(timestamp),
            updated_at: crate::db::connection::now(),
        })
    }

    /// Rebuild the run from its stored form
    pub fn into_run(self) -> DbResult<OrchestrationRun> {
        let status: RunStatus = self.status.parse().map_err(DatabaseError::corrupt)?;
        let started_at = parse_timestamp(&self.started_at).ok_or_else(|| {
            DatabaseError::corrupt(format!("invalid started_at: {}", self.started_at))
        })?;

        Ok(OrchestrationRun {
            session_id: self.session_id,
            user_id: self.user_id,
            message: self.message,
            agent_results: serde_json::from_str(&self.agent_results)?,
            aggregated_response: self.aggregated_response,
            status,
            error_message: self.error_message,
            started_at,
            completed_at: self.completed_at.as_deref().and_then(parse_timestamp),
            execution_time_secs: self.execution_time_secs.unwrap_or_default(),
        })
    }
}
