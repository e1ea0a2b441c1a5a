use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a dashboard view is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardScope {
    Live,
    Run(String),
}

impl std::fmt::Display for DashboardScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashboardScope::Live => write!(f, "live"),
            DashboardScope::Run(id) => write!(f, "run:{}", id),
        }
    }
}

/// Read-only copy of one series window.
///
/// Fields are private so a renderer can only read what it was handed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl SeriesSnapshot {
    pub(crate) fn new(labels: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(labels.len(), values.len());
        Self { labels, values }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<(&str, f64)> {
        let label = self.labels.last()?;
        let value = self.values.last()?;
        Some((label.as_str(), *value))
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// One snapshot per tracked metric, handed to a renderer in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub scope: DashboardScope,
    pub taken_at: DateTime<Utc>,
    series: BTreeMap<String, SeriesSnapshot>,
}

impl DashboardSnapshot {
    pub(crate) fn new(scope: DashboardScope, series: BTreeMap<String, SeriesSnapshot>) -> Self {
        Self {
            scope,
            taken_at: Utc::now(),
            series,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SeriesSnapshot> {
        self.series.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SeriesSnapshot)> {
        self.series.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }

    /// Number of points per series; every series shares it.
    pub fn window_len(&self) -> usize {
        self.series.values().next().map(|s| s.len()).unwrap_or(0)
    }

    /// The shared label sequence.
    pub fn labels(&self) -> &[String] {
        self.series
            .values()
            .next()
            .map(|s| s.labels())
            .unwrap_or(&[])
    }
}
