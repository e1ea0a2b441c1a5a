use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::error::PulseboardError;

/// Counters for the poller's diagnostic side channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerStatus {
    pub is_running: bool,
    pub ticks: u64,
    pub applied: u64,
    pub no_update: u64,
    pub skipped: u64,
    pub failures: u64,
    pub transport_failures: u64,
    pub parse_failures: u64,
    pub consecutive_failures: u32,
    pub discarded: u64,
    pub last_error: Option<String>,
    pub last_error_code: Option<&'static str>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_elapsed_ms: Option<u64>,
    pub last_delay_ms: Option<u64>,
}

impl PollerStatus {
    pub(crate) fn record_applied(&mut self) {
        self.ticks += 1;
        self.applied += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
    }

    pub(crate) fn record_no_update(&mut self) {
        self.ticks += 1;
        self.no_update += 1;
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_discarded(&mut self) {
        self.ticks += 1;
        self.discarded += 1;
    }

    pub(crate) fn record_failure(&mut self, error: &PulseboardError) {
        self.ticks += 1;
        self.failures += 1;
        if error.is_transport_error() {
            self.transport_failures += 1;
        } else if error.is_payload_error() {
            self.parse_failures += 1;
        }
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
        self.last_error_code = Some(error.error_code());
    }

    pub(crate) fn record_timing(&mut self, elapsed: Duration, delay: Duration) {
        self.last_elapsed_ms = Some(elapsed.as_millis() as u64);
        self.last_delay_ms = Some(delay.as_millis() as u64);
    }

    pub fn success_rate(&self) -> f64 {
        let settled = self.applied + self.no_update + self.failures;
        if settled == 0 {
            return 0.0;
        }
        (self.applied + self.no_update) as f64 / settled as f64 * 100.0
    }
}
