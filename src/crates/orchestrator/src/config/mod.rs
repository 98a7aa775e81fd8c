//! Configuration module for the orchestrator
//!
//! Provides TOML configuration loading with `${ENV:default}` expansion and
//! the typed settings for the database, logging, agents, n8n, Langfuse, the
//! sync scheduler and the audit log sink.

pub mod loader;
pub mod settings;

pub use loader::{load, load_file, parse};
pub use settings::{
    AgentsConfig, AppConfig, DatabaseConfig, LangfuseConfig, LogConfig, LogFormat, LogSinkConfig,
    N8nConfig, SchedulerConfig,
};
