//! Application configuration
//!
//! Loaded from `orchestrator.toml`. Every section has defaults, so an empty
//! file (or no file at all) yields a runnable development setup with the
//! stub agent and no sync endpoints.
//!
//! Numeric and boolean settings also accept their text form, so a quoted
//! `${ENV_VAR:default}` placeholder can supply them.

use crate::orchestration::{default_roster, AgentSpec, FanOutSettings};
use connectors::EndpointConfig;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub agents: AgentsConfig,
    pub n8n: N8nConfig,
    pub langfuse: LangfuseConfig,
    pub scheduler: SchedulerConfig,
    pub log_sink: LogSinkConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection string
    pub url: String,
    #[serde(deserialize_with = "scalar")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:orchestrator.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Fmt,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Fmt,
        }
    }
}

/// Agent runtime and roster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Runtime base URL; the stub agent is used when unset
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub alias_id: String,
    /// Replaces every roster id for the remote call when set
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "scalar")]
    pub timeout_secs: u64,
    /// Prefix of audit blob paths
    pub log_prefix: String,
    pub roster: Vec<AgentSpec>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            alias_id: "TSTALIASID".to_string(),
            agent_id: None,
            timeout_secs: 60,
            log_prefix: "orchestrator-logs/".to_string(),
            roster: default_roster(),
        }
    }
}

impl AgentsConfig {
    /// Endpoint of the agent runtime, when configured
    pub fn endpoint_config(&self) -> Option<EndpointConfig> {
        let endpoint = self.endpoint.as_deref().filter(|e| !e.trim().is_empty())?;
        let mut config = EndpointConfig::new(endpoint).with_timeout(self.timeout());
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_api_key(key);
        }
        Some(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn fan_out_settings(&self) -> FanOutSettings {
        FanOutSettings {
            roster: self.roster.clone(),
            alias_id: self.alias_id.clone(),
            agent_override: self.agent_id.clone().filter(|id| !id.is_empty()),
            agent_timeout: self.timeout(),
            log_prefix: self.log_prefix.clone(),
        }
    }
}

/// n8n public API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct N8nConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(deserialize_with = "scalar")]
    pub timeout_secs: u64,
}

impl Default for N8nConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5678".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl N8nConfig {
    pub fn endpoint_config(&self) -> EndpointConfig {
        let mut config = EndpointConfig::new(&self.base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        config
    }
}

/// Langfuse ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LangfuseConfig {
    pub host: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(deserialize_with = "scalar")]
    pub timeout_secs: u64,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            host: "https://cloud.langfuse.com".to_string(),
            public_key: None,
            secret_key: None,
            timeout_secs: 30,
        }
    }
}

impl LangfuseConfig {
    pub fn endpoint_config(&self) -> EndpointConfig {
        let mut config =
            EndpointConfig::new(&self.host).with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(key) = &self.public_key {
            config = config.with_api_key(key);
        }
        if let Some(secret) = &self.secret_key {
            config = config.with_secret_key(secret);
        }
        config
    }
}

/// Sync job intervals and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    #[serde(deserialize_with = "scalar")]
    pub discovery_enabled: bool,
    #[serde(deserialize_with = "scalar")]
    pub discovery_interval_secs: u64,
    #[serde(deserialize_with = "scalar")]
    pub collect_interval_secs: u64,
    #[serde(deserialize_with = "scalar")]
    pub export_interval_secs: u64,
    #[serde(deserialize_with = "scalar")]
    pub source_page_limit: usize,
    #[serde(deserialize_with = "scalar")]
    pub execution_page_limit: usize,
    /// Pause after every export attempt
    #[serde(deserialize_with = "scalar")]
    pub export_delay_ms: u64,
    /// Records per export pass; all when unset or empty
    #[serde(deserialize_with = "opt_scalar")]
    pub export_batch_limit: Option<i64>,
    #[serde(deserialize_with = "scalar")]
    pub run_on_start: bool,
    /// Node whose output becomes the trace input
    pub trigger_node: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            discovery_enabled: true,
            discovery_interval_secs: 300,
            collect_interval_secs: 60,
            export_interval_secs: 60,
            source_page_limit: 100,
            execution_page_limit: 100,
            export_delay_ms: 500,
            export_batch_limit: None,
            run_on_start: false,
            trigger_node: "Webhook".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs.max(1))
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs.max(1))
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs.max(1))
    }

    pub fn export_delay(&self) -> Duration {
        Duration::from_millis(self.export_delay_ms)
    }
}

/// Filesystem audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSinkConfig {
    pub root: String,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            root: "./logs".to_string(),
        }
    }
}

/// A setting given natively or as text
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar<T> {
    Native(T),
    Text(String),
}

fn scalar<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Scalar::<T>::deserialize(deserializer)? {
        Scalar::Native(value) => Ok(value),
        Scalar::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}

/// Like `scalar`; empty text means unset
fn opt_scalar<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<Scalar<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Native(value)) => Ok(Some(value)),
        Some(Scalar::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Scalar::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
    }
}
