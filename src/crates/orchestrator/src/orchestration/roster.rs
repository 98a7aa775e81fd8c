//! Agent roster and per-specialization prompt framing

use connectors::AgentRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an agent on the roster is asked to focus on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Specialization {
    DataAnalysis,
    Recommendations,
    QualityCheck,
    /// Any other label; the message is passed through unframed
    Custom(String),
}

impl Specialization {
    pub fn as_str(&self) -> &str {
        match self {
            Specialization::DataAnalysis => "data_analysis",
            Specialization::Recommendations => "recommendations",
            Specialization::QualityCheck => "quality_check",
            Specialization::Custom(label) => label,
        }
    }

    /// Wrap the user message in this specialization's framing
    pub fn frame(&self, message: &str) -> String {
        match self {
            Specialization::DataAnalysis => format!(
                "Analyze the following request from a data perspective: {}",
                message
            ),
            Specialization::Recommendations => {
                format!("Provide recommendations based on: {}", message)
            }
            Specialization::QualityCheck => {
                format!("Review and validate the quality of this request: {}", message)
            }
            Specialization::Custom(_) => message.to_string(),
        }
    }
}

impl From<String> for Specialization {
    fn from(label: String) -> Self {
        match label.as_str() {
            "data_analysis" => Specialization::DataAnalysis,
            "recommendations" => Specialization::Recommendations,
            "quality_check" => Specialization::QualityCheck,
            _ => Specialization::Custom(label),
        }
    }
}

impl From<Specialization> for String {
    fn from(spec: Specialization) -> Self {
        spec.as_str().to_string()
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent_id: String,
    pub agent_name: String,
    pub specialization: Specialization,
}

impl AgentSpec {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        specialization: Specialization,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            specialization,
        }
    }
}

/// The three-agent roster used when none is configured
pub fn default_roster() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("sub-agent-1", "AnalysisAgent", Specialization::DataAnalysis),
        AgentSpec::new("sub-agent-2", "RecommendationAgent", Specialization::Recommendations),
        AgentSpec::new("sub-agent-3", "QualityAgent", Specialization::QualityCheck),
    ]
}

/// A roster entry bound to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub spec: AgentSpec,
    /// Address used for the remote call
    pub agent: AgentRef,
    pub prompt: String,
}

/// Build one task per roster entry, in roster order
///
/// `agent_override` replaces every entry's id for the remote call only; the
/// entry's own id still names the result.
pub fn build_tasks(
    roster: &[AgentSpec],
    message: &str,
    alias_id: &str,
    agent_override: Option<&str>,
) -> Vec<AgentTask> {
    roster
        .iter()
        .map(|spec| AgentTask {
            agent: AgentRef::new(agent_override.unwrap_or(&spec.agent_id), alias_id),
            prompt: spec.specialization.frame(message),
            spec: spec.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_per_specialization() {
        assert_eq!(
            Specialization::DataAnalysis.frame("sales"),
            "Analyze the following request from a data perspective: sales"
        );
        assert_eq!(
            Specialization::Recommendations.frame("sales"),
            "Provide recommendations based on: sales"
        );
        assert_eq!(
            Specialization::QualityCheck.frame("sales"),
            "Review and validate the quality of this request: sales"
        );
        assert_eq!(Specialization::from("legal".to_string()).frame("sales"), "sales");
    }

    #[test]
    fn test_specialization_deserializes_from_label() {
        let spec: AgentSpec = serde_json::from_value(serde_json::json!({
            "agent_id": "x",
            "agent_name": "X",
            "specialization": "quality_check"
        }))
        .unwrap();
        assert_eq!(spec.specialization, Specialization::QualityCheck);
    }

    #[test]
    fn test_build_tasks_applies_override_to_remote_id_only() {
        let tasks = build_tasks(&default_roster(), "hi", "alias", Some("global"));

        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.agent.agent_id == "global"));
        assert_eq!(tasks[0].spec.agent_id, "sub-agent-1");
        assert_eq!(tasks[2].spec.agent_name, "QualityAgent");

        let plain = build_tasks(&default_roster(), "hi", "alias", None);
        assert_eq!(plain[1].agent, AgentRef::new("sub-agent-2", "alias"));
    }
}
