use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    InFlight,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::InFlight => write!(f, "in_flight"),
        }
    }
}

/// At most one outstanding request per poller.
#[derive(Debug, Default)]
pub(crate) struct FlightGuard {
    in_flight: AtomicBool,
}

impl FlightGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `None` when a request is already outstanding.
    pub(crate) fn try_begin(&self) -> Option<FlightPermit<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit { guard: self })
    }

    pub(crate) fn state(&self) -> PollState {
        if self.in_flight.load(Ordering::Acquire) {
            PollState::InFlight
        } else {
            PollState::Idle
        }
    }
}

/// Returns the guard to `Idle` when dropped, whatever way the cycle ends.
#[derive(Debug)]
pub(crate) struct FlightPermit<'a> {
    guard: &'a FlightGuard,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}
