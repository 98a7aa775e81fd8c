//! Normalized trace model and the trace sink contract.
//!
//! A [`Trace`] is a transient projection of one workflow execution. It is built
//! by the transformer, handed to a [`TraceSink`] and never persisted; only the
//! id returned by the sink is written back to the execution record.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::AddAssign;

/// Token counts reported by a model invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64, total: u64) -> Self {
        Self {
            input,
            output,
            total,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
        self.total += rhs.total;
    }
}

/// Severity of a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanLevel {
    #[default]
    Default,
    Error,
}

/// Model invocation details attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub model: String,
    pub prompt: Value,
    pub completion: Value,
    pub usage: TokenUsage,
}

/// One node run inside a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub level: SpanLevel,
    pub status_message: Option<String>,
    pub metadata: Map<String, Value>,
    pub generation: Option<Generation>,
}

/// A normalized execution trace with nested spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub spans: Vec<Span>,
    /// Summed token usage; absent when no span reported any.
    pub usage: Option<TokenUsage>,
    /// Summed node execution time in milliseconds.
    pub total_execution_ms: u64,
}

impl Trace {
    /// Number of spans carrying a generation.
    pub fn generation_count(&self) -> usize {
        self.spans.iter().filter(|s| s.generation.is_some()).count()
    }
}

/// Contract for the observability backend.
#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Export a trace and return the id the backend stored it under.
    async fn export(&self, trace: &Trace) -> Result<String>;
}
