use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::trace;

use crate::models::{DashboardScope, DashboardSnapshot, MetricSample};

use super::window::{SeriesWindow, DEFAULT_CAPACITY};

pub const DEFAULT_LABEL_FORMAT: &str = "%H:%M:%S";

/// One [`SeriesWindow`] per tracked metric, all sharing one label sequence.
///
/// Windows are only ever mutated together, so every window has the same
/// length and labels after each call.
#[derive(Debug, Clone)]
pub struct DashboardState {
    scope: DashboardScope,
    tracked: Vec<String>,
    windows: BTreeMap<String, SeriesWindow>,
    capacity: usize,
    label_format: String,
    revision: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new<I, S>(scope: DashboardScope, tracked: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = Vec::new();
        for key in tracked {
            let key = key.into();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let windows = keys
            .iter()
            .map(|k| (k.clone(), SeriesWindow::new(capacity)))
            .collect();

        Self {
            scope,
            tracked: keys,
            windows,
            capacity: capacity.max(1),
            label_format: DEFAULT_LABEL_FORMAT.to_string(),
            revision: 0,
            last_updated: None,
        }
    }

    pub fn live<I, S>(tracked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(DashboardScope::Live, tracked, DEFAULT_CAPACITY)
    }

    pub fn with_label_format(mut self, format: impl Into<String>) -> Self {
        self.label_format = format.into();
        self
    }

    pub fn scope(&self) -> &DashboardScope {
        &self.scope
    }

    /// Tracked metric keys in configuration order.
    pub fn tracked_keys(&self) -> &[String] {
        &self.tracked
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn label_format(&self) -> &str {
        &self.label_format
    }

    /// Shared window length.
    pub fn len(&self) -> usize {
        self.windows.values().next().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Increments on every applied update.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn window(&self, key: &str) -> Option<&SeriesWindow> {
        self.windows.get(key)
    }

    /// Pushes one point per tracked metric under the same label.
    pub fn append_sample(&mut self, sample: &MetricSample) {
        let label = sample.display_label(&self.label_format);
        let row: Vec<(String, f64)> = self
            .tracked
            .iter()
            .map(|key| (key.clone(), sample.value_or_zero(key)))
            .collect();

        for (key, value) in row {
            if let Some(window) = self.windows.get_mut(&key) {
                window.push(label.clone(), value);
            }
        }

        self.touch();
        trace!(
            scope = %self.scope,
            label = %label,
            len = self.len(),
            "Appended sample to dashboard"
        );
    }

    /// Rebuilds every window from one sample list. An empty list empties
    /// the dashboard.
    pub fn replace_all_samples(&mut self, samples: &[MetricSample]) {
        let labels: Vec<String> = samples
            .iter()
            .map(|s| s.display_label(&self.label_format))
            .collect();

        for key in &self.tracked {
            let values: Vec<f64> = samples.iter().map(|s| s.value_or_zero(key)).collect();
            if let Some(window) = self.windows.get_mut(key) {
                window.replace_all(labels.clone(), values);
            }
        }

        self.touch();
        trace!(
            scope = %self.scope,
            samples = samples.len(),
            len = self.len(),
            "Replaced dashboard history"
        );
    }

    pub fn clear(&mut self) {
        for window in self.windows.values_mut() {
            window.clear();
        }
        self.touch();
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let series = self
            .windows
            .iter()
            .map(|(k, w)| (k.clone(), w.snapshot()))
            .collect();
        DashboardSnapshot::new(self.scope.clone(), series)
    }

    /// True when every window has the same labels (and hence length).
    pub fn is_synchronized(&self) -> bool {
        let mut windows = self.windows.values();
        let Some(first) = windows.next() else {
            return true;
        };
        windows.all(|w| w.len() == first.len() && w.labels().eq(first.labels()))
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.last_updated = Some(Utc::now());
        debug_assert!(self.is_synchronized());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(secs: u32) -> MetricSample {
        MetricSample::new(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, secs).unwrap())
    }

    #[test]
    fn test_duplicate_keys_are_tracked_once() {
        let state = DashboardState::live(["cpu", "gpu", "cpu"]);
        assert_eq!(state.tracked_keys(), &["cpu".to_string(), "gpu".to_string()]);
    }

    #[test]
    fn test_missing_field_defaults_to_zero() {
        let mut state = DashboardState::live(["cpu", "gpu"]);
        state.append_sample(&sample_at(0).with_value("cpu", 40.0));

        assert_eq!(state.window("cpu").unwrap().latest().unwrap().1, 40.0);
        assert_eq!(state.window("gpu").unwrap().latest().unwrap().1, 0.0);
    }

    #[test]
    fn test_untracked_values_are_ignored() {
        let mut state = DashboardState::live(["cpu"]);
        state.append_sample(&sample_at(0).with_value("cpu", 1.0).with_value("fan", 3.0));
        assert!(state.window("fan").is_none());
        assert_eq!(state.snapshot().metric_count(), 1);
    }

    #[test]
    fn test_append_keeps_windows_synchronized() {
        let mut state = DashboardState::new(DashboardScope::Live, ["cpu", "gpu", "ram"], 2);
        for i in 0..5 {
            state.append_sample(&sample_at(i).with_value("cpu", i as f64));
            assert!(state.is_synchronized());
        }
        assert_eq!(state.len(), 2);
        assert_eq!(state.revision(), 5);
    }

    #[test]
    fn test_replace_all_samples_uses_server_labels() {
        let mut state = DashboardState::new(DashboardScope::Run("7".into()), ["cpu", "gpu"], 60);
        let samples = vec![
            sample_at(0).with_label("10:00:00").with_value("cpu", 1.0),
            sample_at(1).with_label("10:00:01").with_value("gpu", 2.0),
        ];
        state.replace_all_samples(&samples);

        let snap = state.snapshot();
        assert_eq!(snap.labels(), &["10:00:00".to_string(), "10:00:01".to_string()]);
        assert_eq!(snap.get("cpu").unwrap().values(), &[1.0, 0.0]);
        assert_eq!(snap.get("gpu").unwrap().values(), &[0.0, 2.0]);
        assert!(state.is_synchronized());
    }

    #[test]
    fn test_replace_all_samples_bounded_by_capacity() {
        let mut state = DashboardState::new(DashboardScope::Live, ["cpu"], 3);
        let samples: Vec<MetricSample> = (0..10)
            .map(|i| sample_at(i).with_value("cpu", i as f64))
            .collect();
        state.replace_all_samples(&samples);
        assert_eq!(
            state.snapshot().get("cpu").unwrap().values(),
            &[7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn test_label_format_applies_to_timestamps() {
        let mut state = DashboardState::live(["cpu"]).with_label_format("%Y");
        state.append_sample(&sample_at(0));
        assert_eq!(state.snapshot().labels(), &["2025".to_string()]);
    }

    #[test]
    fn test_clear_empties_every_window() {
        let mut state = DashboardState::live(["cpu", "gpu"]);
        state.append_sample(&sample_at(0).with_value("cpu", 5.0));
        state.clear();
        assert!(state.is_empty());
        assert!(state.is_synchronized());
    }
}
