//! Fan-out orchestrator
//!
//! Dispatches one request to every roster entry concurrently, waits for all
//! of them to settle, aggregates the surviving responses and persists the
//! run. A failing agent only ever produces a failed [`AgentResult`]; run-level
//! faults are persisted as an error record and returned to the caller.

use super::aggregate::aggregate;
use super::models::{AgentResult, OrchestrationRun};
use super::roster::{build_tasks, default_roster, AgentSpec, AgentTask};
use crate::store::StateStore;
use crate::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use connectors::{AgentClient, LogSink};
use futures::future::join_all;
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Tunables for the fan-out
#[derive(Debug, Clone)]
pub struct FanOutSettings {
    pub roster: Vec<AgentSpec>,
    /// Alias used for every remote agent call
    pub alias_id: String,
    /// Replaces each roster id for the remote call when set
    pub agent_override: Option<String>,
    /// Upper bound for one agent call
    pub agent_timeout: Duration,
    /// Prefix of the audit blob path
    pub log_prefix: String,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            alias_id: "TSTALIASID".to_string(),
            agent_override: None,
            agent_timeout: Duration::from_secs(60),
            log_prefix: "orchestrator-logs/".to_string(),
        }
    }
}

/// Runs one request across the roster
pub struct FanOutOrchestrator {
    agents: Arc<dyn AgentClient>,
    store: Arc<dyn StateStore>,
    log_sink: Arc<dyn LogSink>,
    settings: FanOutSettings,
}

impl FanOutOrchestrator {
    pub fn new(
        agents: Arc<dyn AgentClient>,
        store: Arc<dyn StateStore>,
        log_sink: Arc<dyn LogSink>,
        settings: FanOutSettings,
    ) -> Self {
        Self {
            agents,
            store,
            log_sink,
            settings,
        }
    }

    pub fn settings(&self) -> &FanOutSettings {
        &self.settings
    }

    /// Run the request and return the finalized run
    ///
    /// A missing session id is replaced by a fresh UUID. On a run-level fault
    /// an error record is stored under the same session id before the error
    /// is returned.
    pub async fn run(
        &self,
        message: &str,
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<OrchestrationRun> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(session_id = %session_id, agents = self.settings.roster.len(), "Starting orchestration");

        let pending = OrchestrationRun::start(session_id.clone(), user_id, message, started_at);
        match self.execute(pending.clone(), clock).await {
            Ok(run) => Ok(run),
            Err(err) => {
                error!(session_id = %session_id, error = %err, "Orchestration failed");
                let failed = pending.fail(err.to_string(), clock.elapsed().as_secs_f64());
                if let Err(store_err) = self.store.save_run(&failed).await {
                    error!(session_id = %session_id, error = %store_err, "Failed to store error record");
                }
                Err(err)
            }
        }
    }

    async fn execute(&self, pending: OrchestrationRun, clock: Instant) -> Result<OrchestrationRun> {
        if pending.message.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let tasks = build_tasks(
            &self.settings.roster,
            &pending.message,
            &self.settings.alias_id,
            self.settings.agent_override.as_deref(),
        );
        let results = self.dispatch(&pending.session_id, &tasks).await;
        let response = aggregate(&results);
        let run = pending.complete(results, response, clock.elapsed().as_secs_f64());

        self.store.save_run(&run).await?;
        self.write_audit(&run).await;

        info!(
            session_id = %run.session_id,
            completed = run.agents_used().len(),
            total = run.agent_results.len(),
            execution_time_secs = run.execution_time_secs,
            "Orchestration completed"
        );
        Ok(run)
    }

    /// Call every agent and wait for all of them, preserving roster order
    async fn dispatch(&self, session_id: &str, tasks: &[AgentTask]) -> Vec<AgentResult> {
        join_all(tasks.iter().map(|task| self.invoke(session_id, task))).await
    }

    async fn invoke(&self, session_id: &str, task: &AgentTask) -> AgentResult {
        let spec = &task.spec;
        let session_key = format!("{}-{}", session_id, spec.agent_id);
        let clock = Instant::now();

        let call = AssertUnwindSafe(self.agents.invoke(&task.agent, &session_key, &task.prompt))
            .catch_unwind();
        let outcome = tokio::time::timeout(self.settings.agent_timeout, call).await;
        let elapsed = clock.elapsed().as_secs_f64();
        let specialization = spec.specialization.as_str();

        match outcome {
            Ok(Ok(Ok(completion))) => {
                AgentResult::completed(&spec.agent_id, &spec.agent_name, specialization, completion, elapsed)
            }
            Ok(Ok(Err(err))) => {
                warn!(session_id, agent_id = %spec.agent_id, error = %err, "Agent call failed");
                AgentResult::failed(&spec.agent_id, &spec.agent_name, specialization, err.to_string(), elapsed)
            }
            Ok(Err(_)) => {
                warn!(session_id, agent_id = %spec.agent_id, "Agent call panicked");
                AgentResult::failed(&spec.agent_id, &spec.agent_name, specialization, "agent call panicked", elapsed)
            }
            Err(_) => {
                warn!(session_id, agent_id = %spec.agent_id, "Agent call timed out");
                AgentResult::failed(
                    &spec.agent_id,
                    &spec.agent_name,
                    specialization,
                    format!("agent call timed out after {:?}", self.settings.agent_timeout),
                    elapsed,
                )
            }
        }
    }

    async fn write_audit(&self, run: &OrchestrationRun) {
        let path = audit_path(&self.settings.log_prefix, run.started_at, &run.session_id);
        let blob = json!({
            "session_id": run.session_id,
            "user_id": run.user_id,
            "timestamp": run.started_at,
            "user_message": run.message,
            "agent_results": run.agent_results,
            "final_response": run.aggregated_response,
            "execution_time": run.execution_time_secs,
        });

        if let Err(err) = self.log_sink.write(&path, blob.to_string().as_bytes()).await {
            warn!(session_id = %run.session_id, path = %path, error = %err, "Failed to write audit log");
        }
    }
}

/// `{prefix}{YYYY}/{MM}/{DD}/{session_id}.json`
pub fn audit_path(prefix: &str, at: DateTime<Utc>, session_id: &str) -> String {
    format!("{}{}/{}.json", prefix, at.format("%Y/%m/%d"), session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_audit_path_is_date_and_session_keyed() {
        let at = Utc.with_ymd_and_hms(2025, 2, 7, 23, 59, 0).unwrap();
        assert_eq!(
            audit_path("orchestrator-logs/", at, "abc"),
            "orchestrator-logs/2025/02/07/abc.json"
        );
    }

    #[test]
    fn test_default_settings_use_default_roster() {
        let settings = FanOutSettings::default();
        assert_eq!(settings.roster.len(), 3);
        assert!(settings.agent_override.is_none());
    }
}
