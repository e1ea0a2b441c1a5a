use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PulseboardError;
use crate::models::DashboardScope;

use super::mapping::FieldMapping;
use super::normalizer::Normalizer;

/// How a normalised sample sequence is applied to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Append every sample (normally exactly one).
    #[default]
    Latest,
    /// Replace all windows with the server's pre-windowed history.
    History,
    /// Append only the newest sample of a history response.
    Tail,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Latest => write!(f, "latest"),
            ResponseMode::History => write!(f, "history"),
            ResponseMode::Tail => write!(f, "tail"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = PulseboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(ResponseMode::Latest),
            "history" => Ok(ResponseMode::History),
            "tail" => Ok(ResponseMode::Tail),
            other => Err(PulseboardError::invalid_config(
                "poller.mode",
                format!("Unknown mode '{}'. Must be one of: latest, history, tail", other),
            )),
        }
    }
}

/// The known metrics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// `/monitor/live`: one object with the machine's current readings.
    #[default]
    MonitorLive,
    /// `/runs/{id}/live`: `{status, metrics: [...]}` for one run.
    RunLive,
    /// `/metrics/by_run/{id}`: array of stored samples for one run.
    MetricsByRun,
    /// Any other path; mapping must be configured.
    Custom,
}

impl EndpointKind {
    pub fn requires_run_id(&self) -> bool {
        matches!(self, EndpointKind::RunLive | EndpointKind::MetricsByRun)
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::MonitorLive => write!(f, "monitor_live"),
            EndpointKind::RunLive => write!(f, "run_live"),
            EndpointKind::MetricsByRun => write!(f, "metrics_by_run"),
            EndpointKind::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for EndpointKind {
    type Err = PulseboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "monitor_live" | "monitor" | "live" => Ok(EndpointKind::MonitorLive),
            "run_live" => Ok(EndpointKind::RunLive),
            "metrics_by_run" | "by_run" => Ok(EndpointKind::MetricsByRun),
            "custom" => Ok(EndpointKind::Custom),
            other => Err(PulseboardError::invalid_config(
                "poller.endpoint",
                format!(
                    "Unknown endpoint '{}'. Must be one of: monitor_live, run_live, metrics_by_run, custom",
                    other
                ),
            )),
        }
    }
}

/// Everything needed to poll one endpoint: path, mode and field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointProfile {
    pub kind: EndpointKind,
    pub path: String,
    pub mode: ResponseMode,
    pub run_id: Option<String>,
    pub normalizer: Normalizer,
}

impl EndpointProfile {
    pub fn monitor_live() -> Self {
        Self {
            kind: EndpointKind::MonitorLive,
            path: "/monitor/live".to_string(),
            mode: ResponseMode::Latest,
            run_id: None,
            normalizer: Normalizer::new(vec![
                FieldMapping::same("cpu"),
                FieldMapping::same("gpu"),
                FieldMapping::same("ram"),
                FieldMapping::new("power_gpu_w", "power"),
                FieldMapping::new("co2_total_kg", "co2_total"),
                FieldMapping::new("co2_gpu_kg", "co2_gpu"),
            ])
            .with_timestamp_field("ts"),
        }
    }

    pub fn run_live(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        Self {
            kind: EndpointKind::RunLive,
            path: format!("/runs/{}/live", run_id),
            mode: ResponseMode::History,
            run_id: Some(run_id),
            normalizer: Normalizer::new(vec![
                FieldMapping::same("cpu"),
                FieldMapping::same("gpu"),
                FieldMapping::same("ram"),
                FieldMapping::same("power"),
            ])
            .with_samples_field("metrics")
            .with_timestamp_field("time")
            .with_label_field("time")
            .with_status_field("status"),
        }
    }

    pub fn metrics_by_run(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        Self {
            kind: EndpointKind::MetricsByRun,
            path: format!("/metrics/by_run/{}", run_id),
            mode: ResponseMode::History,
            run_id: Some(run_id),
            normalizer: Normalizer::new(vec![
                FieldMapping::new("cpu_util", "cpu"),
                FieldMapping::new("gpu_util", "gpu"),
                FieldMapping::new("mem_used_mb", "ram"),
                FieldMapping::new("gpu_power_w", "power"),
            ])
            .with_timestamp_field("ts"),
        }
    }

    pub fn custom(path: impl Into<String>, mappings: Vec<FieldMapping>) -> Self {
        Self {
            kind: EndpointKind::Custom,
            path: path.into(),
            mode: ResponseMode::Latest,
            run_id: None,
            normalizer: Normalizer::new(mappings),
        }
    }

    /// Builds the preset for `kind`. Run endpoints need `run_id`, custom
    /// endpoints need `path`.
    pub fn preset(
        kind: EndpointKind,
        run_id: Option<&str>,
        path: Option<&str>,
    ) -> Result<Self, PulseboardError> {
        let need_run_id = || {
            run_id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
                PulseboardError::MissingConfig(format!("poller.run_id (required by {})", kind))
            })
        };

        let mut profile = match kind {
            EndpointKind::MonitorLive => Self::monitor_live(),
            EndpointKind::RunLive => Self::run_live(need_run_id()?),
            EndpointKind::MetricsByRun => Self::metrics_by_run(need_run_id()?),
            EndpointKind::Custom => {
                let path = path.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                    PulseboardError::MissingConfig("poller.path (required by custom)".to_string())
                })?;
                Self::custom(path, Vec::new())
            }
        };

        if kind != EndpointKind::Custom {
            if let Some(path) = path.filter(|p| !p.trim().is_empty()) {
                profile.path = path.to_string();
            }
        }
        if profile.run_id.is_none() {
            profile.run_id = run_id.map(str::to_string);
        }

        Ok(profile)
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mappings(mut self, mappings: Vec<FieldMapping>) -> Self {
        self.normalizer.mappings = mappings;
        self
    }

    /// Joins the endpoint path onto `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }

    pub fn tracked_keys(&self) -> Vec<String> {
        self.normalizer.targets()
    }

    pub fn scope(&self) -> DashboardScope {
        match &self.run_id {
            Some(id) => DashboardScope::Run(id.clone()),
            None => DashboardScope::Live,
        }
    }
}

impl Default for EndpointProfile {
    fn default() -> Self {
        Self::monitor_live()
    }
}
