//! `clawloop config` — Show the effective configuration.

use clawloop_config::EngineConfig;
use std::path::Path;

use super::{CliResult, load_config};

pub fn show(config_path: Option<&Path>, defaults: bool) -> CliResult {
    if defaults {
        println!("{}", EngineConfig::default_toml());
        return Ok(());
    }

    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    let source = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| EngineConfig::config_dir().join("config.toml"));
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_round_trips() {
        let parsed: EngineConfig = toml::from_str(&EngineConfig::default_toml()).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }
}
