//! Langfuse trace sink.
//!
//! Traces are shipped through the batched ingestion endpoint
//! (`POST /api/public/ingestion`) using basic auth with the project's public
//! and secret keys. One trace becomes one `trace-create` event, one
//! `span-create` per span, and one `generation-create` per span carrying a
//! generation (parented to that span).

use crate::config::EndpointConfig;
use crate::error::{ClientError, Result};
use crate::trace::{Span, Trace, TraceSink};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// HTTP client for the Langfuse ingestion API.
#[derive(Clone)]
pub struct LangfuseClient {
    config: EndpointConfig,
    client: Client,
}

impl LangfuseClient {
    /// Create a new client. Both the public key (`api_key`) and the secret
    /// key must be configured.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        config.require_api_key()?;
        if config.secret_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ClientError::ConfigError(
                "Langfuse secret key missing".to_string(),
            ));
        }
        let client = config.http_client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TraceSink for LangfuseClient {
    async fn export(&self, trace: &Trace) -> Result<String> {
        let url = format!("{}/api/public/ingestion", self.config.base());
        let batch = build_batch(trace, Utc::now());

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.require_api_key()?, self.config.secret_key.as_deref())
            .json(&batch)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(e.to_string())
                } else {
                    ClientError::HttpError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, body));
        }

        let outcome: IngestionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        outcome.into_result()?;

        tracing::debug!(trace_id = %trace.id, spans = trace.spans.len(), "Trace ingested");
        Ok(trace.id.clone())
    }
}

/// Build the ingestion batch for one trace.
pub fn build_batch(trace: &Trace, now: DateTime<Utc>) -> Value {
    let mut events = Vec::with_capacity(1 + trace.spans.len() * 2);

    let mut metadata = trace.metadata.clone();
    metadata.insert(
        "total_execution_ms".to_string(),
        json!(trace.total_execution_ms),
    );
    if let Some(usage) = trace.usage {
        metadata.insert("usage".to_string(), json!(usage));
    }

    events.push(envelope(
        "trace-create",
        now,
        json!({
            "id": trace.id,
            "name": trace.name,
            "timestamp": trace.start_time.map(rfc3339),
            "input": trace.input,
            "output": trace.output,
            "metadata": metadata,
            "tags": trace.tags,
        }),
    ));

    for span in &trace.spans {
        events.push(envelope("span-create", now, span_body(&trace.id, span)));

        if let Some(generation) = &span.generation {
            events.push(envelope(
                "generation-create",
                now,
                json!({
                    "id": format!("{}-generation", span.id),
                    "traceId": trace.id,
                    "parentObservationId": span.id,
                    "name": format!("{}-generation", span.name),
                    "startTime": span.start_time.map(rfc3339),
                    "endTime": span.end_time.map(rfc3339),
                    "model": generation.model,
                    "input": generation.prompt,
                    "output": generation.completion,
                    "usage": {
                        "input": generation.usage.input,
                        "output": generation.usage.output,
                        "total": generation.usage.total,
                        "unit": "TOKENS",
                    },
                }),
            ));
        }
    }

    json!({ "batch": events })
}

fn span_body(trace_id: &str, span: &Span) -> Value {
    json!({
        "id": span.id,
        "traceId": trace_id,
        "name": span.name,
        "startTime": span.start_time.map(rfc3339),
        "endTime": span.end_time.map(rfc3339),
        "input": span.input,
        "output": span.output,
        "metadata": span.metadata,
        "level": span.level,
        "statusMessage": span.status_message,
    })
}

fn envelope(kind: &str, now: DateTime<Utc>, body: Value) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "timestamp": rfc3339(now),
        "type": kind,
        "body": body,
    })
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Default, Deserialize)]
struct IngestionResponse {
    #[serde(default)]
    errors: Vec<IngestionError>,
}

#[derive(Debug, Deserialize)]
struct IngestionError {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    message: Option<String>,
}

impl IngestionResponse {
    fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let detail = self
            .errors
            .iter()
            .map(|e| {
                format!(
                    "{} ({}): {}",
                    e.id,
                    e.status,
                    e.message.as_deref().unwrap_or("rejected")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        if self.errors.iter().any(|e| e.status == 429) {
            Err(ClientError::RateLimitExceeded(detail))
        } else {
            Err(ClientError::ValidationError(detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Generation, SpanLevel, TokenUsage};
    use serde_json::Map;

    fn sample_trace() -> Trace {
        Trace {
            id: "trace-1".to_string(),
            name: "n8n-execution-7".to_string(),
            input: json!({"q": "hi"}),
            output: json!({"answer": "hello"}),
            metadata: Map::new(),
            tags: vec!["n8n".to_string()],
            start_time: None,
            end_time: None,
            spans: vec![Span {
                id: "span-1".to_string(),
                name: "Chat Model-0".to_string(),
                input: json!({"messages": ["hi"]}),
                output: json!({"text": "hello"}),
                start_time: None,
                end_time: None,
                level: SpanLevel::Default,
                status_message: None,
                metadata: Map::new(),
                generation: Some(Generation {
                    model: "gpt-4o-mini".to_string(),
                    prompt: json!(["hi"]),
                    completion: json!("hello"),
                    usage: TokenUsage::new(3, 2, 5),
                }),
            }],
            usage: Some(TokenUsage::new(3, 2, 5)),
            total_execution_ms: 120,
        }
    }

    #[test]
    fn test_batch_contains_trace_span_and_generation() {
        let batch = build_batch(&sample_trace(), Utc::now());
        let events = batch["batch"].as_array().unwrap();

        let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["trace-create", "span-create", "generation-create"]);

        assert_eq!(events[0]["body"]["metadata"]["total_execution_ms"], 120);
        assert_eq!(events[0]["body"]["metadata"]["usage"]["total"], 5);
        assert_eq!(events[2]["body"]["parentObservationId"], "span-1");
        assert_eq!(events[2]["body"]["usage"]["input"], 3);
    }

    #[test]
    fn test_partial_failure_is_validation_error() {
        let response: IngestionResponse = serde_json::from_value(json!({
            "successes": [{"id": "a", "status": 201}],
            "errors": [{"id": "b", "status": 400, "message": "invalid body"}]
        }))
        .unwrap();
        assert!(matches!(response.into_result(), Err(ClientError::ValidationError(_))));
    }

    #[test]
    fn test_rate_limited_batch() {
        let response: IngestionResponse = serde_json::from_value(json!({
            "errors": [{"id": "b", "status": 429}]
        }))
        .unwrap();
        assert!(matches!(response.into_result(), Err(ClientError::RateLimitExceeded(_))));
    }

    #[test]
    fn test_client_requires_both_keys() {
        let config = EndpointConfig::new("https://cloud.langfuse.com").with_api_key("pk-lf");
        assert!(LangfuseClient::new(config.clone()).is_err());
        assert!(LangfuseClient::new(config.with_secret_key("sk-lf")).is_ok());
    }
}
