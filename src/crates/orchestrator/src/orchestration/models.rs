//! Domain types produced by one fan-out run

use chrono::{DateTime, Utc};
use connectors::AgentCompletion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Outcome of a single agent call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Completed,
    Failed,
}

/// Result of dispatching the request to one roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub agent_name: String,
    pub specialization: String,
    pub status: AgentStatus,
    pub response: Option<String>,
    pub error: Option<String>,
    pub execution_time_secs: f64,
    #[serde(default)]
    pub citations: Vec<Value>,
    #[serde(default)]
    pub trace: Vec<Value>,
}

impl AgentResult {
    /// Successful call
    pub fn completed(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        specialization: impl Into<String>,
        completion: AgentCompletion,
        execution_time_secs: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            specialization: specialization.into(),
            status: AgentStatus::Completed,
            response: Some(completion.text),
            error: None,
            execution_time_secs,
            citations: completion.citations,
            trace: completion.trace,
        }
    }

    /// Failed call; the error text is kept for the per-agent list
    pub fn failed(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        specialization: impl Into<String>,
        error: impl Into<String>,
        execution_time_secs: f64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            specialization: specialization.into(),
            status: AgentStatus::Failed,
            response: None,
            error: Some(error.into()),
            execution_time_secs,
            citations: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }

    /// Response text when the agent completed with something to say
    pub fn contribution(&self) -> Option<&str> {
        match (&self.status, self.response.as_deref()) {
            (AgentStatus::Completed, Some(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Lifecycle state of an orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// One invocation of the fan-out orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub session_id: String,
    pub user_id: Option<String>,
    pub message: String,
    /// Per-agent results in dispatch order
    pub agent_results: Vec<AgentResult>,
    pub aggregated_response: Option<String>,
    pub status: RunStatus,
    /// Set on error-state runs only
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_secs: f64,
}

impl OrchestrationRun {
    /// A run that has started but not settled
    pub fn start(
        session_id: impl Into<String>,
        user_id: Option<String>,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            message: message.into(),
            agent_results: Vec::new(),
            aggregated_response: None,
            status: RunStatus::Running,
            error_message: None,
            started_at,
            completed_at: None,
            execution_time_secs: 0.0,
        }
    }

    /// Finalize after every agent settled
    pub fn complete(
        mut self,
        agent_results: Vec<AgentResult>,
        aggregated_response: String,
        execution_time_secs: f64,
    ) -> Self {
        self.agent_results = agent_results;
        self.aggregated_response = Some(aggregated_response);
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.execution_time_secs = execution_time_secs;
        self
    }

    /// Turn into the error-state record for the same session
    pub fn fail(mut self, error: impl Into<String>, execution_time_secs: f64) -> Self {
        self.status = RunStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.execution_time_secs = execution_time_secs;
        self
    }

    /// Names of the agents that completed, in dispatch order
    pub fn agents_used(&self) -> Vec<&str> {
        self.agent_results
            .iter()
            .filter(|r| r.is_completed())
            .map(|r| r.agent_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_round_trips_through_text() {
        for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("done".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_agents_used_lists_completed_only() {
        let results = vec![
            AgentResult::failed("a", "A", "x", "boom", 0.1),
            AgentResult::completed("b", "B", "x", AgentCompletion::default(), 0.2),
            AgentResult::completed(
                "c",
                "C",
                "x",
                AgentCompletion {
                    text: "ok".into(),
                    ..Default::default()
                },
                0.3,
            ),
        ];
        let run = OrchestrationRun::start("s", None, "m", Utc::now()).complete(results, "r".into(), 1.0);

        assert_eq!(run.agents_used(), vec!["B", "C"]);
        assert_eq!(run.status, RunStatus::Completed);
        // an empty completion counts as completed but contributes no text
        assert_eq!(run.agent_results[1].contribution(), None);
        assert_eq!(run.agent_results[2].contribution(), Some("ok"));
    }

    #[test]
    fn test_fail_keeps_message_and_sets_error() {
        let run = OrchestrationRun::start("s", Some("u".into()), "m", Utc::now()).fail("store down", 0.5);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("store down"));
        assert_eq!(run.user_id.as_deref(), Some("u"));
        assert!(run.completed_at.is_some());
    }
}
