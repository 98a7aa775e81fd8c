//! Typed, lenient view of an n8n execution payload
//!
//! Every field is optional. Different node types fill different subsets of
//! a run, so extraction goes through explicit fallback chains in the
//! converter instead of probing raw JSON.
//!
//! Parsing never fails on a field: a null or wrongly typed value becomes
//! the field's default, a bad element of a list becomes a default element,
//! and numeric timings may arrive as floats or strings.

use super::TransformError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Connection name (`main`, `ai_languageModel`, ...) to output branches
pub type ConnectionData = BTreeMap<String, Vec<Option<Vec<NodeItem>>>>;

/// Full execution detail as returned with `includeData=true`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionPayload {
    #[serde(deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub workflow_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub started_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub stopped_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub workflow_data: WorkflowData,
    #[serde(deserialize_with = "lenient")]
    pub data: ExecutionData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowData {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_seq")]
    pub nodes: Vec<NodeDefinition>,
}

/// Static node definition from the workflow
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeDefinition {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub node_type: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionData {
    pub start_data: Value,
    #[serde(deserialize_with = "lenient")]
    pub result_data: ResultData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultData {
    /// Node name to its runs, ordered by node name
    #[serde(deserialize_with = "lenient_run_data")]
    pub run_data: BTreeMap<String, Vec<NodeRun>>,
    #[serde(deserialize_with = "lenient")]
    pub last_node_executed: Option<String>,
    pub error: Option<Value>,
    /// Every other key of `resultData`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultData {
    /// `resultData` without `runData`, used as the generic result fallback
    pub fn summary(&self) -> Map<String, Value> {
        let mut summary = self.extra.clone();
        if let Some(last) = &self.last_node_executed {
            summary.insert("lastNodeExecuted".to_string(), Value::String(last.clone()));
        }
        if let Some(error) = &self.error {
            summary.insert("error".to_string(), error.clone());
        }
        summary
    }
}

/// One run of one node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeRun {
    /// Epoch milliseconds
    #[serde(deserialize_with = "lenient_millis")]
    pub start_time: Option<i64>,
    /// Milliseconds
    #[serde(deserialize_with = "lenient_count")]
    pub execution_time: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub execution_status: Option<String>,
    #[serde(deserialize_with = "lenient_seq")]
    pub source: Vec<Option<SourceRef>>,
    #[serde(deserialize_with = "lenient_connections")]
    pub input_override: Option<ConnectionData>,
    #[serde(deserialize_with = "lenient_connections")]
    pub data: Option<ConnectionData>,
    pub error: Option<Value>,
}

impl NodeRun {
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.execution_status.as_deref() == Some("error")
    }

    /// Names of the declared upstream nodes, deduplicated in order
    pub fn upstream_nodes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.source.iter().flatten().filter_map(|s| s.previous_node.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Error message of a failed run
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceRef {
    #[serde(deserialize_with = "lenient")]
    pub previous_node: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    pub previous_node_run: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub previous_node_output: Option<u64>,
}

/// One output item; only its `json` part is traced
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeItem {
    pub json: Value,
}

impl ExecutionPayload {
    /// Parse a stored payload
    pub fn from_json(value: &Value) -> Result<Self, TransformError> {
        if !value.is_object() {
            return Err(TransformError::NotAnObject);
        }
        Ok(Self::deserialize(value)?)
    }

    pub fn parse(text: &str) -> Result<Self, TransformError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Static definition of a node
    pub fn node(&self, name: &str) -> Option<&NodeDefinition> {
        self.workflow_data.nodes.iter().find(|n| n.name == name)
    }

    /// Runs recorded for a node
    pub fn runs(&self, name: &str) -> Option<&[NodeRun]> {
        self.data.result_data.run_data.get(name).map(Vec::as_slice)
    }
}

/// JSON of the items on the first branch of one connection
///
/// One item yields its object, several yield an array, none yield `None`.
pub fn branch_payload(data: &ConnectionData, connection: &str) -> Option<Value> {
    let items = data.get(connection)?.first()?.as_ref()?;
    match items.as_slice() {
        [] => None,
        [one] => Some(one.json.clone()),
        many => Some(Value::Array(many.iter().map(|i| i.json.clone()).collect())),
    }
}

/// Payload of the first connection that carries one
pub fn any_payload(data: &ConnectionData) -> Option<Value> {
    data.keys().find_map(|connection| branch_payload(data, connection))
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `T` when the value fits, `T::default()` otherwise
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(seq_of(Value::deserialize(deserializer)?))
}

/// Elements keep their position; one that does not fit becomes a default
fn seq_of<T: DeserializeOwned + Default>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| T::deserialize(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_run_data<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<NodeRun>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(nodes) => nodes.into_iter().map(|(name, runs)| (name, seq_of(runs))).collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_connections<'de, D>(deserializer: D) -> Result<Option<ConnectionData>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(connections) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        connections
            .into_iter()
            .map(|(name, branches)| (name, branches_of(branches)))
            .collect(),
    ))
}

/// A branch that is not a list is absent; items that are not objects are dropped
fn branches_of(value: Value) -> Vec<Option<Vec<NodeItem>>> {
    let Value::Array(branches) = value else {
        return Vec::new();
    };
    branches
        .into_iter()
        .map(|branch| match branch {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter(Value::is_object)
                    .filter_map(|item| NodeItem::deserialize(item).ok())
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n: &f64| n.is_finite())
}

/// Epoch milliseconds; fractions are rounded
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().or_else(|| number(&value).map(|n| n.round() as i64)))
}

/// Non-negative count or duration; fractions are rounded
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| number(&value).filter(|n| *n >= 0.0).map(|n| n.round() as u64)))
}
