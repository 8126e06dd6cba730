//! # Cadre Config
//!
//! Unified single-file configuration management for Cadre. A single
//! `cadre.yaml` configures runtime limits, routing strategy, the
//! reasoning provider, tool sandboxing, checkpoint storage, and
//! observability.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Config errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level configuration schema for Cadre.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CadreConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub checkpoints: CheckpointsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Engine limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Hard step budget per run; a run that reaches it terminates with
    /// a logged terminal event instead of spinning.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    /// Max transcript entries forwarded as reasoning context (0 = all).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_steps() -> u64 {
    32
}

fn default_history_limit() -> usize {
    50
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            history_limit: default_history_limit(),
        }
    }
}

/// Supervisor strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Deterministic dependency-driven routing over the goal DAG
    #[default]
    Dependency,
    /// Fixed User -> Planner -> Executor -> FINISH pipeline
    Pipeline,
    /// LLM-routed roster selection
    LlmRoster,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub strategy: RoutingStrategy,
}

/// Reasoning provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key. Left unset for local
    /// providers that accept any key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Built-in tool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Register the built-in tool set for workers.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory file tools are confined to. Defaults to the
    /// process working directory at registry build time.
    #[serde(default)]
    pub sandbox_root: Option<PathBuf>,
    /// Environment variable holding the search API key; without it the
    /// search tool serves canned results.
    #[serde(default = "default_search_key_env")]
    pub search_api_key_env: String,
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
}

fn default_true() -> bool {
    true
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sandbox_root: None,
            search_api_key_env: default_search_key_env(),
            search_endpoint: default_search_endpoint(),
        }
    }
}

/// Checkpoint store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointsConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(".cadre/checkpoints")
}

impl Default for CheckpointsConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            path: default_checkpoint_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Load configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<CadreConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: CadreConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let config = CadreConfig::default();
        assert_eq!(config.runtime.max_steps, 32);
        assert_eq!(config.routing.strategy, RoutingStrategy::Dependency);
        assert_eq!(config.checkpoints.backend, CheckpointBackend::Memory);
        assert!(config.tools.enabled);
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
runtime:
  max_steps: 8
routing:
  strategy: pipeline
reasoning:
  model: gpt-4o-mini
  endpoint: https://api.openai.com/v1/chat/completions
checkpoints:
  backend: file
  path: /tmp/cadre-checkpoints
"#;
        let config: CadreConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.runtime.max_steps, 8);
        assert_eq!(config.runtime.history_limit, 50);
        assert_eq!(config.routing.strategy, RoutingStrategy::Pipeline);
        assert_eq!(config.reasoning.model, "gpt-4o-mini");
        assert_eq!(config.reasoning.timeout_secs, 60);
        assert_eq!(config.checkpoints.backend, CheckpointBackend::File);
        assert_eq!(
            config.checkpoints.path,
            PathBuf::from("/tmp/cadre-checkpoints")
        );
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let yaml = "routing:\n  strategy: roulette\n";
        assert!(serde_yaml::from_str::<CadreConfig>(yaml).is_err());
    }
}
