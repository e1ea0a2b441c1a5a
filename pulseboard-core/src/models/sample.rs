use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status reported by run-scoped endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Other(String),
}

impl RunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "running" => RunStatus::Running,
            "finished" => RunStatus::Finished,
            other => RunStatus::Other(other.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Finished => write!(f, "finished"),
            RunStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One polled observation, already mapped onto tracked metric keys.
///
/// A key missing from `values` reads as the caller's default; there is no
/// gap marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    /// Server-provided display label, used verbatim when present.
    pub label: Option<String>,
    pub values: BTreeMap<String, f64>,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            label: None,
            values: BTreeMap::new(),
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_value(mut self, key: impl Into<String>, value: f64) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn value_or_zero(&self, key: &str) -> f64 {
        self.value(key).unwrap_or(0.0)
    }

    /// Display label: the server label if any, else the timestamp rendered
    /// in local time with `format`.
    pub fn display_label(&self, format: &str) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self
                .timestamp
                .with_timezone(&chrono::Local)
                .format(format)
                .to_string(),
        }
    }
}
