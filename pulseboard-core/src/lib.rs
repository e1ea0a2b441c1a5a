#![allow(
    clippy::needless_borrows_for_generic_args,
    clippy::manual_range_contains,
    clippy::derivable_impls,
    clippy::len_zero
)]

pub mod config;
pub mod error;
pub mod models;
pub mod payload;
pub mod poller;
pub mod series;

pub use config::{
    config_search_paths, get_config_dir, DashboardConfig, LoggingConfig, PollerConfig,
    PulseboardConfig,
};
pub use error::{CliErrorDisplay, PollErrorKind, PulseboardError, PulseboardResult};
pub use models::{DashboardScope, DashboardSnapshot, MetricSample, RunStatus, SeriesSnapshot};
pub use payload::{
    parse_timestamp, EndpointKind, EndpointProfile, FieldMapping, NormalizedPayload, Normalizer,
    ResponseMode,
};
pub use poller::{
    next_delay, ChannelSink, HttpMetricsSource, MetricsSource, NullSink, PollState,
    PollerSettings, PollerStatus, RenderSink, SamplePoller, TickOutcome, DEFAULT_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use series::{
    DashboardState, SeriesWindow, DEFAULT_CAPACITY, DEFAULT_LABEL_FORMAT, LEGACY_CAPACITY,
};
