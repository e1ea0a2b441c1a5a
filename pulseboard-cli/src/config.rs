use anyhow::{Context, Result};
use clap::Args;
use pulseboard_core::{EndpointKind, PulseboardConfig, ResponseMode};

/// Per-invocation overrides layered over the loaded configuration.
#[derive(Debug, Clone, Default, Args)]
pub struct CliOverrides {
    #[arg(short, long, help = "Endpoint preset (monitor_live, run_live, metrics_by_run, custom)")]
    pub endpoint: Option<EndpointKind>,

    #[arg(short, long, help = "Run id for the run_live and metrics_by_run endpoints")]
    pub run_id: Option<String>,

    #[arg(long, help = "Endpoint path (required for custom, overrides presets)")]
    pub path: Option<String>,

    #[arg(short, long, env = "PULSEBOARD_BASE_URL", help = "Base URL of the metrics server")]
    pub base_url: Option<String>,

    #[arg(short, long, help = "Polling interval in milliseconds")]
    pub interval_ms: Option<u64>,

    #[arg(short, long, help = "Points kept per metric")]
    pub capacity: Option<usize>,

    #[arg(short, long, help = "Response mode (latest, history, tail)")]
    pub mode: Option<ResponseMode>,
}

impl CliOverrides {
    pub fn apply(&self, mut config: PulseboardConfig) -> Result<PulseboardConfig> {
        if let Some(endpoint) = self.endpoint {
            config.poller.endpoint = endpoint;
        }
        if let Some(run_id) = &self.run_id {
            config.poller.run_id = Some(run_id.clone());
        }
        if let Some(path) = &self.path {
            config.poller.path = Some(path.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.poller.base_url = base_url.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.poller.interval_ms = interval_ms;
        }
        if let Some(capacity) = self.capacity {
            config.dashboard.capacity = capacity;
        }
        if let Some(mode) = self.mode {
            config.poller.mode = Some(mode);
        }

        config
            .validate()
            .context("Invalid configuration after command-line overrides")?;
        Ok(config)
    }
}
