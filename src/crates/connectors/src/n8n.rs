//! n8n workflow engine client.
//!
//! Uses the n8n public REST API (`/api/v1`) authenticated with the
//! `X-N8N-API-KEY` header. Workflows are the execution sources; their
//! executions carry numeric ids that only increase within one workflow.

use crate::config::EndpointConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// An active workflow as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time as reported by the engine (RFC 3339), unparsed.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// One entry of an execution listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ExecutionSummary {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Some(status.into()),
        }
    }

    /// Numeric execution id, when the engine sent one.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }

    /// Whether the execution reached a terminal state.
    pub fn is_finished(&self) -> bool {
        !matches!(
            self.status.as_deref(),
            Some("new") | Some("running") | Some("waiting")
        )
    }
}

/// Contract for the workflow engine that produces execution records.
#[async_trait]
pub trait ExecutionSourceClient: Send + Sync {
    /// List active sources, at most `limit`.
    async fn list_active_sources(&self, limit: usize) -> Result<Vec<SourceSummary>>;

    /// List the most recent executions of one source, at most `limit`.
    async fn list_executions(&self, source_id: &str, limit: usize)
        -> Result<Vec<ExecutionSummary>>;

    /// Fetch the full, opaque execution record.
    async fn get_execution_detail(&self, execution_id: &str) -> Result<Value>;
}

/// HTTP client for the n8n public API.
#[derive(Clone)]
pub struct N8nClient {
    config: EndpointConfig,
    client: Client,
}

impl N8nClient {
    /// Create a new client. Fails when no API key is configured.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        config.require_api_key()?;
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/api/v1/{}", self.config.base(), path);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.require_api_key()?)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(format!("GET {}: {}", url, e))
                } else {
                    ClientError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("GET {}: {}", url, e)))
    }
}

#[async_trait]
impl ExecutionSourceClient for N8nClient {
    async fn list_active_sources(&self, limit: usize) -> Result<Vec<SourceSummary>> {
        let body = self
            .get_json(
                "workflows",
                &[
                    ("active", "true".to_string()),
                    ("excludePinnedData", "true".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        unwrap_data(body)
    }

    async fn list_executions(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionSummary>> {
        let body = self
            .get_json(
                "executions",
                &[
                    ("workflowId", source_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        unwrap_data(body)
    }

    async fn get_execution_detail(&self, execution_id: &str) -> Result<Value> {
        self.get_json(
            &format!("executions/{}", execution_id),
            &[("includeData", "true".to_string())],
        )
        .await
    }
}

/// Extract the `data` array of a list response.
pub fn unwrap_data<T: serde::de::DeserializeOwned>(body: Value) -> Result<Vec<T>> {
    #[derive(Deserialize)]
    struct Page<T> {
        #[serde(default = "Vec::new")]
        data: Vec<T>,
    }

    let page: Page<T> = serde_json::from_value(body)
        .map_err(|e| ClientError::InvalidResponse(format!("unexpected list shape: {}", e)))?;
    Ok(page.data)
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_execution_page() {
        let body = json!({
            "data": [
                {"id": "42", "status": "success", "workflowId": "wf-1"},
                {"id": 43, "status": "running"}
            ],
            "nextCursor": null
        });

        let executions: Vec<ExecutionSummary> = unwrap_data(body).unwrap();
        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].numeric_id(), Some(42));
        assert_eq!(executions[1].numeric_id(), Some(43));
        assert!(executions[0].is_finished());
        assert!(!executions[1].is_finished());
    }

    #[test]
    fn test_unwrap_workflow_page() {
        let body = json!({
            "data": [{
                "id": "wf-1",
                "name": "Support bot",
                "active": true,
                "createdAt": "2025-05-01T10:00:00.000Z"
            }]
        });

        let sources: Vec<SourceSummary> = unwrap_data(body).unwrap();
        assert_eq!(sources[0].id, "wf-1");
        assert_eq!(sources[0].created_at.as_deref(), Some("2025-05-01T10:00:00.000Z"));
        assert_eq!(sources[0].description, None);
    }

    #[test]
    fn test_missing_data_is_empty() {
        let executions: Vec<ExecutionSummary> = unwrap_data(json!({})).unwrap();
        assert!(executions.is_empty());
    }

    #[test]
    fn test_non_numeric_id() {
        let summary = ExecutionSummary::new("abc", "success");
        assert_eq!(summary.numeric_id(), None);
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(N8nClient::new(EndpointConfig::new("http://localhost:5678")).is_err());
        assert!(
            N8nClient::new(EndpointConfig::new("http://localhost:5678").with_api_key("k")).is_ok()
        );
    }
}
