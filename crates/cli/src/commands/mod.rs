pub mod config_cmd;
pub mod plan;
pub mod run;
pub mod tools;

use clawloop_config::EngineConfig;
use clawloop_core::provider::ScriptedProvider;
use std::path::Path;
use std::sync::Arc;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load_with_env(path),
        None => EngineConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Decode a script: a JSON array of reply strings.
pub fn parse_script(content: &str) -> CliResult<Vec<String>> {
    let replies: Vec<String> =
        serde_json::from_str(content).map_err(|e| format!("Invalid script: {e}"))?;
    if replies.is_empty() {
        return Err("Script contains no replies".into());
    }
    Ok(replies)
}

/// Build the model client named by the configuration.
pub fn build_provider(config: &EngineConfig, script: &Path) -> CliResult<Arc<ScriptedProvider>> {
    if config.provider != "scripted" {
        return Err(format!(
            "Provider '{}' is not available; only 'scripted' is built in",
            config.provider
        )
        .into());
    }
    let content = std::fs::read_to_string(script)
        .map_err(|e| format!("Failed to read script {}: {e}", script.display()))?;
    let replies = parse_script(&content)?;
    tracing::debug!(replies = replies.len(), model = %config.model, "Loaded script");
    Ok(Arc::new(ScriptedProvider::new(replies)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_a_list_of_strings() {
        let replies = parse_script(r#"["TOOL_CALL: {\"name\":\"add\"}", "done"]"#).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1], "done");
    }

    #[test]
    fn empty_or_malformed_script_is_rejected() {
        assert!(parse_script("[]").is_err());
        assert!(parse_script(r#"{"replies": []}"#).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EngineConfig {
            provider: "openai".into(),
            ..EngineConfig::default()
        };
        let err = build_provider(&config, Path::new("unused.json")).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }
}
