mod dashboard;
mod window;

pub use dashboard::{DashboardState, DEFAULT_LABEL_FORMAT};
pub use window::{SeriesWindow, DEFAULT_CAPACITY, LEGACY_CAPACITY};
