//! Client contracts for the collaborators of the orchestrator.
//!
//! Every external system is reached through a narrow async trait so the
//! orchestrator can be wired with real HTTP clients in production and with
//! in-process fakes in tests:
//!
//! - [`AgentClient`] - remote agent runtime ([`HttpAgentClient`], [`StubAgentClient`])
//! - [`ExecutionSourceClient`] - workflow engine ([`N8nClient`])
//! - [`TraceSink`] - observability backend ([`LangfuseClient`])
//! - [`LogSink`] - durable audit log ([`FsLogSink`])
//!
//! # Example
//!
//! ```rust,ignore
//! use connectors::{EndpointConfig, ExecutionSourceClient, N8nClient};
//!
//! let config = EndpointConfig::new("http://localhost:5678").with_api_key("n8n-key");
//! let n8n = N8nClient::new(config)?;
//! for source in n8n.list_active_sources(100).await? {
//!     println!("{} {}", source.id, source.name);
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod langfuse;
pub mod log_sink;
pub mod n8n;
pub mod trace;

pub use agent::{AgentClient, AgentCompletion, AgentRef, HttpAgentClient, StubAgentClient};
pub use config::EndpointConfig;
pub use error::{ClientError, Result};
pub use langfuse::LangfuseClient;
pub use log_sink::{FsLogSink, LogSink};
pub use n8n::{ExecutionSourceClient, ExecutionSummary, N8nClient, SourceSummary};
pub use trace::{Generation, Span, SpanLevel, TokenUsage, Trace, TraceSink};
