//! Multi-agent fan-out orchestration
//!
//! One user request is framed per specialization, sent to every agent on the
//! roster at once, and the completed answers are folded into a single
//! response.

pub mod aggregate;
pub mod fanout;
pub mod models;
pub mod roster;

pub use aggregate::{aggregate, FALLBACK_RESPONSE};
pub use fanout::{audit_path, FanOutOrchestrator, FanOutSettings};
pub use models::{AgentResult, AgentStatus, OrchestrationRun, RunStatus};
pub use roster::{build_tasks, default_roster, AgentSpec, AgentTask, Specialization};
