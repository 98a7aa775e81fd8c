//! TOML configuration loader with environment variable support
//!
//! String values may contain `${ENV_VAR:default}` placeholders; they are
//! expanded after parsing, so substituted values never change the document
//! structure.

use super::settings::AppConfig;
use crate::OrchestratorError;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use toml::Value;

/// Load configuration from the default location or environment
///
/// Searches for config in:
/// 1. CONFIG_PATH environment variable
/// 2. ./config/orchestrator.toml
/// 3. ./orchestrator.toml
///
/// Falls back to defaults when no file exists.
pub fn load() -> Result<AppConfig, OrchestratorError> {
    if let Ok(config_path) = env::var("CONFIG_PATH") {
        return load_file(config_path);
    }

    let paths = [
        PathBuf::from("config/orchestrator.toml"),
        PathBuf::from("./orchestrator.toml"),
    ];
    for path in &paths {
        if path.exists() {
            return load_file(path);
        }
    }

    tracing::debug!("No configuration file found, using defaults");
    Ok(AppConfig::default())
}

/// Load configuration from a TOML file
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<AppConfig, OrchestratorError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        OrchestratorError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    parse(&content)
}

/// Parse configuration from a TOML string, expanding placeholders
pub fn parse(content: &str) -> Result<AppConfig, OrchestratorError> {
    let mut value: Value = toml::from_str(content)
        .map_err(|e| OrchestratorError::Config(format!("Failed to parse TOML: {}", e)))?;
    expand_variables(&mut value);

    AppConfig::deserialize(value)
        .map_err(|e| OrchestratorError::Config(format!("Invalid configuration: {}", e)))
}

/// Expand environment variables in every string value
fn expand_variables(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                expand_variables(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expand `${ENV_VAR:default}` occurrences in a string
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let re = Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;
    let expanded = re.replace_all(s, |cap: &regex::Captures| {
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        env::var(&cap[1]).unwrap_or_else(|_| default_value.to_string())
    });

    Some(expanded.into_owned())
}
