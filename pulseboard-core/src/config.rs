use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PulseboardError, PulseboardResult};
use crate::payload::{EndpointKind, EndpointProfile, FieldMapping, ResponseMode};
use crate::poller::{HttpMetricsSource, PollerSettings, RenderSink, SamplePoller};
use crate::series::{DashboardState, DEFAULT_CAPACITY, DEFAULT_LABEL_FORMAT};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PulseboardConfig {
    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Overrides the endpoint preset's field mapping when non-empty.
    #[serde(default)]
    pub metrics: Vec<FieldMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default = "default_label_format")]
    pub label_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub endpoint: EndpointKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ResponseMode>,

    #[serde(default = "default_true")]
    pub stop_when_finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_label_format() -> String {
    DEFAULT_LABEL_FORMAT.to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            label_format: default_label_format(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: EndpointKind::default(),
            run_id: None,
            path: None,
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            mode: None,
            stop_when_finished: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl PulseboardConfig {
    pub fn load() -> PulseboardResult<Self> {
        Self::load_from_paths(config_search_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> PulseboardResult<Self> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PULSEBOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: PulseboardConfig = builder.build()?.try_deserialize()?;

        if let Ok(url) = std::env::var("PULSEBOARD_BASE_URL") {
            config.poller.base_url = url;
        }

        if let Ok(interval) = std::env::var("PULSEBOARD_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                config.poller.interval_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("PULSEBOARD_LOG_LEVEL") {
            config.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> PulseboardResult<()> {
        if self.dashboard.capacity == 0 {
            return Err(PulseboardError::invalid_config(
                "dashboard.capacity",
                "Must be greater than 0",
            ));
        }

        if self.poller.interval_ms == 0 {
            return Err(PulseboardError::invalid_config(
                "poller.interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.poller.request_timeout_ms == 0 {
            return Err(PulseboardError::invalid_config(
                "poller.request_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.poller.base_url.trim().is_empty() {
            return Err(PulseboardError::MissingConfig("poller.base_url".to_string()));
        }

        if !self.poller.base_url.starts_with("http://")
            && !self.poller.base_url.starts_with("https://")
        {
            return Err(PulseboardError::invalid_config(
                "poller.base_url",
                "Must be an HTTP URL starting with http:// or https://",
            ));
        }

        // Surfaces a missing run_id or path
        EndpointProfile::preset(
            self.poller.endpoint,
            self.poller.run_id.as_deref(),
            self.poller.path.as_deref(),
        )?;

        let mut targets = HashSet::new();
        for mapping in &self.metrics {
            if mapping.source.trim().is_empty() || mapping.target.trim().is_empty() {
                return Err(PulseboardError::invalid_config(
                    "metrics",
                    "Field mappings need a non-empty source and target",
                ));
            }
            if !targets.insert(mapping.target.as_str()) {
                return Err(PulseboardError::invalid_config(
                    "metrics",
                    format!("Duplicate target '{}'", mapping.target),
                ));
            }
        }

        if self.poller.endpoint == EndpointKind::Custom && self.metrics.is_empty() {
            return Err(PulseboardError::MissingConfig(
                "metrics (custom endpoints need a field mapping)".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(PulseboardError::invalid_config(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            ));
        }

        Ok(())
    }

    /// The endpoint profile with `poller.mode` and `metrics` overrides applied.
    pub fn resolve_profile(&self) -> PulseboardResult<EndpointProfile> {
        let mut profile = EndpointProfile::preset(
            self.poller.endpoint,
            self.poller.run_id.as_deref(),
            self.poller.path.as_deref(),
        )?;

        if let Some(mode) = self.poller.mode {
            profile = profile.with_mode(mode);
        }
        if !self.metrics.is_empty() {
            profile = profile.with_mappings(self.metrics.clone());
        }

        Ok(profile)
    }

    pub fn endpoint_url(&self) -> PulseboardResult<String> {
        Ok(self.resolve_profile()?.url(&self.poller.base_url))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poller.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.poller.request_timeout_ms)
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn dashboard_state(&self, profile: &EndpointProfile) -> DashboardState {
        DashboardState::new(profile.scope(), profile.tracked_keys(), self.dashboard.capacity)
            .with_label_format(self.dashboard.label_format.clone())
    }

    pub fn http_source(&self, profile: &EndpointProfile) -> PulseboardResult<HttpMetricsSource> {
        HttpMetricsSource::with_timeout(profile.url(&self.poller.base_url), self.request_timeout())
    }

    pub fn poller_settings(&self, profile: &EndpointProfile) -> PollerSettings {
        PollerSettings::for_profile(profile)
            .with_interval(self.interval())
            .with_stop_when_finished(self.poller.stop_when_finished)
    }

    /// Wires an HTTP-backed poller for the configured endpoint.
    pub fn build_poller(&self, sink: Arc<dyn RenderSink>) -> PulseboardResult<SamplePoller> {
        let profile = self.resolve_profile()?;
        let source = self.http_source(&profile)?;

        Ok(SamplePoller::new(
            self.dashboard_state(&profile),
            Arc::new(source),
            sink,
            profile.normalizer.clone(),
            self.poller_settings(&profile),
        ))
    }
}

/// Config files in load order; later files override earlier ones.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("pulseboard.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".pulseboard").join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    for path in get_dotenv_paths() {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

fn get_dotenv_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".pulseboard").join(".env"));
    }

    paths
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pulseboard"))
}
