//! Execution payload to trace conversion
//!
//! Pure and infallible once the payload parsed: every field has a fallback
//! chain ending in an empty value.

use super::payload::{any_payload, branch_payload, ExecutionPayload, NodeRun};
use chrono::{DateTime, Duration, TimeZone, Utc};
use connectors::{Generation, Span, SpanLevel, TokenUsage, Trace};
use serde_json::{json, Map, Value};
use uuid::Uuid;

const MAIN: &str = "main";
const LANGUAGE_MODEL: &str = "ai_languageModel";

/// Conversion knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Node whose output is the trace input; it gets no span
    pub trigger_node: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            trigger_node: "Webhook".to_string(),
        }
    }
}

/// Deterministic trace id of one execution
pub fn trace_id(source_id: &str, execution_id: i64) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("n8n://{}/executions/{}", source_id, execution_id).as_bytes(),
    )
}

/// Convert one execution into a trace with a span per node run
pub fn convert(
    payload: &ExecutionPayload,
    source_id: &str,
    execution_id: i64,
    options: &TransformOptions,
) -> Trace {
    let trace_uuid = trace_id(source_id, execution_id);
    let run_data = &payload.data.result_data.run_data;

    let mut spans = Vec::new();
    let mut usage: Option<TokenUsage> = None;
    let mut total_execution_ms = 0u64;

    for (node_name, runs) in run_data {
        for (index, run) in runs.iter().enumerate() {
            total_execution_ms += run.execution_time.unwrap_or(0);
            let run_usage = model_output(run).and_then(|out| token_usage(&out));
            if let Some(found) = run_usage {
                *usage.get_or_insert_with(TokenUsage::default) += found;
            }
            if *node_name == options.trigger_node {
                continue;
            }
            spans.push(build_span(payload, &trace_uuid, node_name, index, run, run_usage));
        }
    }

    let status = payload.status.clone().unwrap_or_else(|| "unknown".to_string());
    let execution_ref = payload
        .id
        .clone()
        .unwrap_or_else(|| execution_id.to_string());

    let mut metadata = Map::new();
    metadata.insert(
        "workflow_id".into(),
        json!(payload.workflow_id.as_deref().unwrap_or(source_id)),
    );
    metadata.insert("workflow_name".into(), json!(payload.workflow_data.name));
    metadata.insert("status".into(), json!(status));
    metadata.insert("mode".into(), json!(payload.mode));
    metadata.insert("n8n_execution_id".into(), json!(execution_ref));

    Trace {
        id: trace_uuid.to_string(),
        name: format!("n8n-execution-{}", execution_ref),
        input: trace_input(payload, options),
        output: trace_output(payload),
        metadata,
        tags: vec!["n8n".to_string(), "workflow".to_string(), status],
        start_time: payload.started_at.as_deref().and_then(parse_time),
        end_time: payload.stopped_at.as_deref().and_then(parse_time),
        spans,
        usage,
        total_execution_ms,
    }
}

/// Trigger output, else `startData`, else empty
fn trace_input(payload: &ExecutionPayload, options: &TransformOptions) -> Value {
    payload
        .runs(&options.trigger_node)
        .and_then(|runs| runs.first())
        .and_then(main_output)
        .or_else(|| non_empty(&payload.data.start_data))
        .unwrap_or_else(empty)
}

/// Last executed node's output, else `resultData` without `runData`, else empty
fn trace_output(payload: &ExecutionPayload) -> Value {
    let result = &payload.data.result_data;
    result
        .last_node_executed
        .as_deref()
        .and_then(|name| payload.runs(name))
        .and_then(|runs| runs.last())
        .and_then(main_output)
        .or_else(|| {
            let summary = result.summary();
            (!summary.is_empty()).then_some(Value::Object(summary))
        })
        .unwrap_or_else(empty)
}

fn build_span(
    payload: &ExecutionPayload,
    trace_uuid: &Uuid,
    node_name: &str,
    index: usize,
    run: &NodeRun,
    usage: Option<TokenUsage>,
) -> Span {
    let name = format!("{}-{}", node_name, index);
    let node = payload.node(node_name);
    let input = span_input(payload, run);
    let output = model_output(run)
        .and_then(|out| out.get("response").cloned())
        .or_else(|| main_output(run))
        .unwrap_or_else(empty);

    let start_time = run
        .start_time
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    let end_time = start_time.and_then(|start| {
        run.execution_time
            .and_then(|ms| i64::try_from(ms).ok())
            .map(|ms| start + Duration::milliseconds(ms))
    });

    let mut metadata = Map::new();
    metadata.insert("node_type".into(), json!(node.and_then(|n| n.node_type.as_deref())));
    metadata.insert("execution_status".into(), json!(run.execution_status));
    metadata.insert("run_index".into(), json!(index));
    if let Some(ms) = run.execution_time {
        metadata.insert("execution_time_ms".into(), json!(ms));
    }

    let (level, status_message) = if run.is_error() {
        (
            SpanLevel::Error,
            Some(run.error_message().unwrap_or_else(|| "node execution failed".to_string())),
        )
    } else {
        (SpanLevel::Default, None)
    };

    let generation = usage.map(|usage| Generation {
        model: model_name(payload, node_name, run),
        prompt: prompt_of(run).unwrap_or_else(|| input.clone()),
        completion: completion_of(run).unwrap_or(Value::Null),
        usage,
    });

    Span {
        id: Uuid::new_v5(trace_uuid, name.as_bytes()).to_string(),
        name,
        input,
        output,
        start_time,
        end_time,
        level,
        status_message,
        metadata,
        generation,
    }
}

/// Override payload, else the outputs of the declared upstream nodes, else empty
fn span_input(payload: &ExecutionPayload, run: &NodeRun) -> Value {
    if let Some(overridden) = run.input_override.as_ref().and_then(any_payload) {
        return overridden;
    }

    let upstream = run.upstream_nodes();
    if upstream.is_empty() {
        return empty();
    }

    let resolved: Vec<(&str, Option<Value>)> = upstream
        .iter()
        .map(|name| (*name, upstream_output(payload, run, name)))
        .collect();

    if resolved.iter().all(|(_, out)| out.is_none()) {
        return json!({ "upstream": upstream });
    }
    match resolved.as_slice() {
        [(_, Some(single))] => single.clone(),
        many => Value::Object(
            many.iter()
                .map(|(name, out)| (name.to_string(), out.clone().unwrap_or(Value::Null)))
                .collect(),
        ),
    }
}

fn upstream_output(payload: &ExecutionPayload, run: &NodeRun, name: &str) -> Option<Value> {
    let run_index = run
        .source
        .iter()
        .flatten()
        .find(|s| s.previous_node.as_deref() == Some(name))
        .and_then(|s| s.previous_node_run)
        .unwrap_or(0) as usize;

    payload
        .runs(name)
        .and_then(|runs| runs.get(run_index).or_else(|| runs.last()))
        .and_then(main_output)
}

fn main_output(run: &NodeRun) -> Option<Value> {
    run.data.as_ref().and_then(|data| branch_payload(data, MAIN))
}

fn model_output(run: &NodeRun) -> Option<Value> {
    run.data.as_ref().and_then(|data| branch_payload(data, LANGUAGE_MODEL))
}

fn override_payload(run: &NodeRun) -> Option<Value> {
    run.input_override.as_ref().and_then(any_payload)
}

/// Token counts from `tokenUsage` or `tokenUsageEstimate`; arrays are summed
pub fn token_usage(output: &Value) -> Option<TokenUsage> {
    if let Value::Array(items) = output {
        return items.iter().filter_map(token_usage).reduce(|mut acc, next| {
            acc += next;
            acc
        });
    }

    let usage = output
        .get("tokenUsage")
        .or_else(|| output.get("tokenUsageEstimate"))?;
    let count = |keys: [&str; 2]| keys.iter().find_map(|k| usage.get(*k).and_then(Value::as_u64));

    let input = count(["promptTokens", "input"]);
    let output = count(["completionTokens", "output"]);
    let total = count(["totalTokens", "total"]);
    if input.is_none() && output.is_none() && total.is_none() {
        return None;
    }

    let (input, output) = (input.unwrap_or(0), output.unwrap_or(0));
    Some(TokenUsage::new(input, output, total.unwrap_or(input + output)))
}

fn model_name(payload: &ExecutionPayload, node_name: &str, run: &NodeRun) -> String {
    let from_override = override_payload(run).and_then(|p| {
        let options = p.get("options")?;
        options
            .get("model")
            .or_else(|| options.get("model_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    from_override
        .or_else(|| {
            let params = &payload.node(node_name)?.parameters;
            let model = params.get("model").or_else(|| params.get("modelName"))?;
            // resource-locator parameters wrap the name in {"value": ...}
            model
                .as_str()
                .or_else(|| model.get("value").and_then(Value::as_str))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn prompt_of(run: &NodeRun) -> Option<Value> {
    let overridden = override_payload(run)?;
    Some(overridden.get("messages").cloned().unwrap_or(overridden))
}

fn completion_of(run: &NodeRun) -> Option<Value> {
    let response = model_output(run)?.get("response")?.clone();
    let text = response
        .pointer("/generations/0/0/text")
        .or_else(|| response.get("text"))
        .cloned();
    Some(text.unwrap_or(response))
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn non_empty(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}
