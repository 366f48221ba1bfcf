//! Configuration loading, validation, and management for ClawLoop.
//!
//! Loads configuration from `~/.clawloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Iteration bound used when neither the file nor the environment sets one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Marker a model reply starts with when it asks for a tool.
pub const DEFAULT_TOOL_CALL_PREFIX: &str = "TOOL_CALL:";

/// The root configuration structure.
///
/// Maps directly to `~/.clawloop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model client to use
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed to the client
    #[serde(default = "default_model")]
    pub model: String,

    /// Single-agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Plan-execute pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Multi-agent orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

fn default_provider() -> String {
    "scripted".into()
}
fn default_model() -> String {
    "replay".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Upper bound on model calls per invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_tool_call_prefix")]
    pub tool_call_prefix: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Prepended to every conversation when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Deadline for one agent or plan-execute invocation; 0 disables it
    #[serde(default)]
    pub timeout_secs: u64,
}

impl AgentSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}
fn default_tool_call_prefix() -> String {
    DEFAULT_TOOL_CALL_PREFIX.into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_call_prefix: default_tool_call_prefix(),
            temperature: default_temperature(),
            system_prompt: None,
            timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Ask the model to compose a final answer from the step outputs
    #[serde(default = "default_true")]
    pub synthesize: bool,

    /// Argument key that receives the previous step's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_output_key: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            synthesize: true,
            forward_output_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Deadline for a whole parallel or piped run; 0 disables it
    #[serde(default)]
    pub timeout_secs: u64,
}

impl OrchestratorSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.clawloop/config.toml).
    ///
    /// Environment overrides:
    /// - `CLAWLOOP_PROVIDER`
    /// - `CLAWLOOP_MODEL`
    /// - `AGENT_MAX_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    ///
    /// An unparsable or zero `AGENT_MAX_ITERATIONS` is ignored with a
    /// warning and the iteration bound falls back to the default.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("CLAWLOOP_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("CLAWLOOP_MODEL") {
            self.model = model;
        }
        if let Some(raw) = lookup("AGENT_MAX_ITERATIONS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.agent.max_iterations = n,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        fallback = DEFAULT_MAX_ITERATIONS,
                        "Invalid AGENT_MAX_ITERATIONS, using default"
                    );
                    self.agent.max_iterations = DEFAULT_MAX_ITERATIONS;
                }
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clawloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.tool_call_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.tool_call_prefix must not be empty".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self
            .pipeline
            .forward_output_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "pipeline.forward_output_key must not be blank".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            agent: AgentSettings::default(),
            pipeline: PipelineSettings::default(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.tool_call_prefix, "TOOL_CALL:");
        assert!(config.pipeline.synthesize);
        assert!(config.orchestrator.timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_settings_rejected() {
        let mut config = EngineConfig::default();
        config.agent.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.agent.tool_call_prefix = "  ".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.pipeline.forward_output_key = Some("".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model = "llama3"

[agent]
max_iterations = 4
timeout_secs = 5

[pipeline]
synthesize = false
forward_output_key = "text"

[orchestrator]
timeout_secs = 30
"#
        )
        .unwrap();

        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.provider, "scripted");
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.tool_call_prefix, "TOOL_CALL:");
        assert!(!config.pipeline.synthesize);
        assert_eq!(config.pipeline.forward_output_key.as_deref(), Some("text"));
        assert_eq!(config.orchestrator.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.agent.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn agent_timeout_defaults_to_disabled() {
        let config = EngineConfig::default();
        assert_eq!(config.agent.timeout_secs, 0);
        assert_eq!(config.agent.timeout(), None);
        assert!(EngineConfig::default_toml().contains("timeout_secs = 0"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\nmax_iterations = ").unwrap();
        let err = EngineConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 0").unwrap();
        let err = EngineConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = EngineConfig::default();
        config.apply_overrides(env(&[
            ("CLAWLOOP_PROVIDER", "ollama"),
            ("CLAWLOOP_MODEL", "qwen"),
            ("AGENT_MAX_ITERATIONS", "3"),
        ]));
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "qwen");
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[test]
    fn invalid_iteration_override_falls_back_to_default() {
        for bad in ["many", "0", "-2", ""] {
            let mut config = EngineConfig::default();
            config.agent.max_iterations = 7;
            config.apply_overrides(env(&[("AGENT_MAX_ITERATIONS", bad)]));
            assert_eq!(config.agent.max_iterations, DEFAULT_MAX_ITERATIONS, "input {bad:?}");
        }
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = EngineConfig::default_toml();
        assert!(toml_str.contains("TOOL_CALL:"));
        assert!(toml_str.contains("max_iterations = 10"));
    }
}
