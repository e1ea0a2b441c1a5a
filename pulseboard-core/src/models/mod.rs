mod sample;
mod snapshot;

pub use sample::{MetricSample, RunStatus};
pub use snapshot::{DashboardScope, DashboardSnapshot, SeriesSnapshot};
