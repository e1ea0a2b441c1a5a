use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Wait before the next tick: the part of `interval` the last cycle did not
/// use, never negative.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
