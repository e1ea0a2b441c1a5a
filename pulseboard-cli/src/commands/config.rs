use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use pulseboard_core::{
    config_search_paths, EndpointProfile, PulseboardConfig, PulseboardError, PulseboardResult,
};

use crate::config::CliOverrides;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
}

pub fn handle_config_command(
    config: PulseboardConfig,
    overrides: &CliOverrides,
    format: ConfigFormat,
) -> Result<()> {
    let config = overrides.apply(config)?;
    let profile = config.resolve_profile()?;

    match format {
        ConfigFormat::Json => println!("{}", config_json(&config, &profile)?),
        ConfigFormat::Toml => {
            println!("{}", "# Effective configuration".dimmed());
            println!("{}", config_toml(&config)?);
            println!("{}", "# Resolved endpoint".dimmed());
            println!("# url     = {}", profile.url(&config.poller.base_url));
            println!("# mode    = {}", profile.mode);
            println!("# tracked = {}", profile.tracked_keys().join(", "));
            println!();
            println!("{}", "# Searched config files (later wins)".dimmed());
            for path in config_search_paths() {
                let marker = if path.exists() { "✓".green() } else { "-".dimmed() };
                println!("# {} {}", marker, path.display());
            }
        }
    }

    Ok(())
}

fn config_json(config: &PulseboardConfig, profile: &EndpointProfile) -> PulseboardResult<String> {
    let output = serde_json::json!({
        "config": config,
        "resolved": {
            "url": profile.url(&config.poller.base_url),
            "mode": profile.mode,
            "tracked": profile.tracked_keys(),
        },
    });
    serde_json::to_string_pretty(&output).map_err(PulseboardError::serialization)
}

fn config_toml(config: &PulseboardConfig) -> PulseboardResult<String> {
    toml::to_string_pretty(config).map_err(PulseboardError::serialization)
}
