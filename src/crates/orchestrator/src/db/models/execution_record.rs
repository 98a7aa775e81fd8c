//! ExecutionRecord model for database persistence
//!
//! One execution pulled from the engine. The `(source_id, execution_id)` pair
//! is the dedup key; `processed` flips to true exactly once, together with the
//! id of the exported trace.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// A stored execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRecord {
    /// Workflow the execution belongs to
    pub source_id: String,

    /// Engine execution id, monotonic within the source only
    pub execution_id: i64,

    /// Engine status: success, error, crashed, canceled, ...
    pub status: String,

    /// Trigger mode reported by the engine (optional)
    pub mode: Option<String>,

    /// Execution start timestamp (ISO8601 string, optional)
    pub started_at: Option<String>,

    /// Execution stop timestamp (ISO8601 string, optional)
    pub stopped_at: Option<String>,

    /// Full execution detail as JSON string
    pub payload: String,

    /// Whether the execution has been exported as a trace
    pub processed: bool,

    /// Id of the exported trace (set together with `processed`)
    pub trace_id: Option<String>,

    /// Time the record was stored (ISO8601 string)
    pub ingested_at: String,

    /// Time the record was marked processed (ISO8601 string, optional)
    pub processed_at: Option<String>,
}

impl ExecutionRecord {
    /// Parse the stored payload
    pub fn payload_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.payload)
    }
}

/// An execution about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecutionRecord {
    pub source_id: String,
    pub execution_id: i64,
    pub status: String,
    pub mode: Option<String>,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub payload: String,
}

impl NewExecutionRecord {
    /// Build a record from an engine execution detail.
    ///
    /// Status, mode and timestamps are lifted from the detail when present;
    /// `fallback_status` is used when the detail carries no status.
    pub fn from_detail(
        source_id: impl Into<String>,
        execution_id: i64,
        fallback_status: Option<&str>,
        detail: &Value,
    ) -> Self {
        let text = |key: &str| detail.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            source_id: source_id.into(),
            execution_id,
            status: text("status")
                .or_else(|| fallback_status.map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string()),
            mode: text("mode"),
            started_at: text("startedAt"),
            stopped_at: text("stoppedAt"),
            payload: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_detail_lifts_fields() {
        let detail = json!({
            "id": "12",
            "status": "success",
            "mode": "webhook",
            "startedAt": "2025-06-01T10:00:00.000Z",
            "stoppedAt": "2025-06-01T10:00:02.000Z",
            "data": {}
        });

        let record = NewExecutionRecord::from_detail("wf-1", 12, Some("error"), &detail);
        assert_eq!(record.status, "success");
        assert_eq!(record.mode.as_deref(), Some("webhook"));
        assert_eq!(record.started_at.as_deref(), Some("2025-06-01T10:00:00.000Z"));
        assert_eq!(serde_json::from_str::<Value>(&record.payload).unwrap(), detail);
    }

    #[test]
    fn test_from_detail_falls_back_to_summary_status() {
        let record = NewExecutionRecord::from_detail("wf-1", 3, Some("error"), &json!({}));
        assert_eq!(record.status, "error");

        let record = NewExecutionRecord::from_detail("wf-1", 3, None, &json!({}));
        assert_eq!(record.status, "unknown");
        assert_eq!(record.mode, None);
    }
}
