//! Remote agent runtime client.
//!
//! An agent is addressed by an id plus an alias; every invocation carries a
//! session key so the runtime can keep per-session memory. The runtime answers
//! with a list of completion events (text chunks, trace steps, citations) that
//! are folded into a single [`AgentCompletion`].

use crate::config::EndpointConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of one remote agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    /// Agent identifier in the runtime.
    pub agent_id: String,
    /// Alias (deployment) of the agent.
    pub alias_id: String,
}

impl AgentRef {
    pub fn new(agent_id: impl Into<String>, alias_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            alias_id: alias_id.into(),
        }
    }
}

/// Folded result of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCompletion {
    /// Concatenated completion text.
    pub text: String,
    /// Citation events, in arrival order.
    #[serde(default)]
    pub citations: Vec<Value>,
    /// Trace events, in arrival order.
    #[serde(default)]
    pub trace: Vec<Value>,
}

/// Contract for invoking one external agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Invoke `agent` with `prompt` inside the runtime session `session_key`.
    async fn invoke(
        &self,
        agent: &AgentRef,
        session_key: &str,
        prompt: &str,
    ) -> Result<AgentCompletion>;
}

/// HTTP client for an agent runtime.
#[derive(Clone)]
pub struct HttpAgentClient {
    config: EndpointConfig,
    client: Client,
}

impl HttpAgentClient {
    /// Create a new client with the given configuration.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    /// Invocation endpoint; ids and the session key are percent-encoded
    fn invoke_url(&self, agent: &AgentRef, session_key: &str) -> Result<Url> {
        let mut url = Url::parse(self.config.base())
            .map_err(|e| ClientError::ConfigError(format!("invalid agent endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::ConfigError("agent endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend([
                "agents",
                agent.agent_id.as_str(),
                "agentAliases",
                agent.alias_id.as_str(),
                "sessions",
                session_key,
                "text",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke(
        &self,
        agent: &AgentRef,
        session_key: &str,
        prompt: &str,
    ) -> Result<AgentCompletion> {
        tracing::debug!(
            agent_id = %agent.agent_id,
            session_key,
            "Invoking remote agent"
        );

        let mut request = self
            .client
            .post(self.invoke_url(agent, session_key)?)
            .json(&InvokeRequest { input_text: prompt });
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else {
                ClientError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, body));
        }

        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        Ok(fold_events(body.completion))
    }
}

/// Fold runtime events into a completion: chunks are concatenated, traces and
/// citations kept in order, unknown events ignored.
pub fn fold_events(events: Vec<CompletionEvent>) -> AgentCompletion {
    let mut completion = AgentCompletion::default();
    for event in events {
        match event {
            CompletionEvent::Chunk { chunk } => completion.text.push_str(&chunk.bytes),
            CompletionEvent::Trace { trace } => completion.trace.push(trace),
            CompletionEvent::Citation { citation } => completion.citations.push(citation),
            CompletionEvent::Other(_) => {}
        }
    }
    completion
}

/// Deterministic stand-in used when no runtime endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct StubAgentClient;

impl StubAgentClient {
    const CANNED: [&'static str; 3] = [
        "processed: {}... Analysis complete.",
        "analyzed: {}... Recommendations generated.",
        "reviewed: {}... Quality check passed.",
    ];
}

#[async_trait]
impl AgentClient for StubAgentClient {
    async fn invoke(
        &self,
        agent: &AgentRef,
        session_key: &str,
        prompt: &str,
    ) -> Result<AgentCompletion> {
        tracing::info!(agent_id = %agent.agent_id, session_key, "Using stub agent response");

        let excerpt: String = prompt.chars().take(50).collect();
        let slot = agent.agent_id.bytes().map(usize::from).sum::<usize>() % Self::CANNED.len();
        let text = format!("{} {}", agent.agent_id, Self::CANNED[slot].replace("{}", &excerpt));

        Ok(AgentCompletion {
            text,
            citations: Vec::new(),
            trace: vec![serde_json::json!({
                "step": "mock_processing",
                "details": "Mock agent execution"
            })],
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    input_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    completion: Vec<CompletionEvent>,
}

/// One event of the runtime's completion stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompletionEvent {
    Chunk { chunk: ChunkPayload },
    Trace { trace: Value },
    Citation { citation: Value },
    Other(Value),
}

/// Text fragment of a completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkPayload {
    #[serde(default)]
    pub bytes: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fold_events_in_order() {
        let events: Vec<CompletionEvent> = serde_json::from_value(json!([
            {"chunk": {"bytes": "Hello, "}},
            {"trace": {"step": "reasoning"}},
            {"citation": {"source": "doc-1"}},
            {"chunk": {"bytes": "world"}},
            {"unknown": true}
        ]))
        .unwrap();

        let completion = fold_events(events);
        assert_eq!(completion.text, "Hello, world");
        assert_eq!(completion.trace, vec![json!({"step": "reasoning"})]);
        assert_eq!(completion.citations, vec![json!({"source": "doc-1"})]);
    }

    #[test]
    fn test_invoke_url() {
        let client = HttpAgentClient::new(EndpointConfig::new("http://runtime/")).unwrap();
        let url = client
            .invoke_url(&AgentRef::new("sub-agent-1", "TSTALIASID"), "s-1-sub-agent-1")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://runtime/agents/sub-agent-1/agentAliases/TSTALIASID/sessions/s-1-sub-agent-1/text"
        );
    }

    #[test]
    fn test_invoke_url_encodes_segments() {
        let client = HttpAgentClient::new(EndpointConfig::new("http://runtime/v1/")).unwrap();
        let url = client
            .invoke_url(&AgentRef::new("team/agent", "live"), "a/b?c#d e")
            .unwrap();

        assert_eq!(url.path_segments().unwrap().count(), 8);
        assert_eq!(
            url.as_str(),
            "http://runtime/v1/agents/team%2Fagent/agentAliases/live/sessions/a%2Fb%3Fc%23d%20e/text"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[tokio::test]
    async fn test_stub_is_deterministic() {
        let stub = StubAgentClient;
        let agent = AgentRef::new("sub-agent-2", "alias");
        let first = stub.invoke(&agent, "s", "What is the forecast?").await.unwrap();
        let second = stub.invoke(&agent, "s", "What is the forecast?").await.unwrap();

        assert_eq!(first, second);
        assert!(first.text.contains("What is the forecast?"));
        assert_eq!(first.trace.len(), 1);
    }
}
