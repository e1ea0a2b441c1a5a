use std::collections::VecDeque;

use crate::models::SeriesSnapshot;

pub const DEFAULT_CAPACITY: usize = 60;
/// Window size the older run charts used.
pub const LEGACY_CAPACITY: usize = 20;

/// Bounded FIFO buffer of `(label, value)` points for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    points: VecDeque<(String, f64)>,
    capacity: usize,
}

impl SeriesWindow {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends one point, evicting the oldest when over capacity.
    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((label.into(), value));
    }

    /// Replaces the whole buffer. Input longer than the capacity keeps its
    /// most recent tail. Mismatched lengths are aligned on the newest point.
    pub fn replace_all(&mut self, labels: Vec<String>, values: Vec<f64>) {
        let paired = labels.len().min(values.len());
        let keep = paired.min(self.capacity);
        let label_skip = labels.len() - keep;
        let value_skip = values.len() - keep;

        self.points.clear();
        self.points.extend(
            labels
                .into_iter()
                .skip(label_skip)
                .zip(values.into_iter().skip(value_skip)),
        );
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn latest(&self) -> Option<(&str, f64)> {
        self.points.back().map(|(l, v)| (l.as_str(), *v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|(l, _)| l.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, v)| *v)
    }

    /// Owned copy for a renderer; later pushes do not affect it.
    pub fn snapshot(&self) -> SeriesSnapshot {
        let (labels, values) = self
            .points
            .iter()
            .map(|(l, v)| (l.clone(), *v))
            .unzip();
        SeriesSnapshot::new(labels, values)
    }
}

impl Default for SeriesWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
