//! Record-to-trace transformation
//!
//! Turns one stored n8n execution into a [`connectors::Trace`]: the trigger
//! node feeds the trace input, every other node run becomes a span, and
//! model-invocation runs carry a generation with token usage.

pub mod converter;
pub mod payload;

pub use converter::{convert, token_usage, trace_id, TransformOptions};
pub use payload::ExecutionPayload;

use crate::db::models::ExecutionRecord;
use connectors::Trace;
use thiserror::Error;

/// Errors raised before conversion starts
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("execution payload is not a JSON object")]
    NotAnObject,

    #[error("invalid execution payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Parse a stored record's payload and convert it
pub fn convert_record(
    record: &ExecutionRecord,
    options: &TransformOptions,
) -> Result<Trace, TransformError> {
    let payload = ExecutionPayload::parse(&record.payload)?;
    Ok(convert(&payload, &record.source_id, record.execution_id, options))
}
