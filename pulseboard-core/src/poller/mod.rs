mod flight;
mod schedule;
mod sink;
mod source;
mod status;

pub use flight::PollState;
pub use schedule::{next_delay, DEFAULT_INTERVAL};
pub use sink::{ChannelSink, NullSink, RenderSink};
pub use source::{HttpMetricsSource, MetricsSource, DEFAULT_REQUEST_TIMEOUT};
pub use status::PollerStatus;

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::error::PulseboardError;
use crate::models::{DashboardSnapshot, MetricSample};
use crate::payload::{EndpointProfile, Normalizer, ResponseMode};
use crate::series::DashboardState;

use flight::FlightGuard;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub mode: ResponseMode,
    pub stop_when_finished: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            mode: ResponseMode::Latest,
            stop_when_finished: true,
        }
    }
}

impl PollerSettings {
    pub fn for_profile(profile: &EndpointProfile) -> Self {
        Self {
            mode: profile.mode,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stop_when_finished(mut self, stop: bool) -> Self {
        self.stop_when_finished = stop;
        self
    }
}

/// Result of one poll cycle. Errors end here; nothing is thrown past a tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Samples were applied and the sink was drawn.
    Applied { samples: usize, finished: bool },
    /// The response held no samples; buffers untouched.
    NoUpdate,
    /// A request was already in flight; this tick was dropped.
    Skipped,
    /// Transport or parse failure; buffers untouched.
    Failed(PulseboardError),
    /// The poller was stopped while the request was outstanding.
    Discarded,
}

impl TickOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TickOutcome::Applied { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TickOutcome::Applied { finished: true, .. })
    }
}

/// Loop handles; only touched while holding `PollerInner::lifecycle`.
#[derive(Default)]
struct Lifecycle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

struct PollerInner {
    id: Uuid,
    state: Arc<RwLock<DashboardState>>,
    source: Arc<dyn MetricsSource>,
    sink: Arc<dyn RenderSink>,
    normalizer: Normalizer,
    settings: PollerSettings,
    flight: FlightGuard,
    running: AtomicBool,
    generation: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
    status: RwLock<PollerStatus>,
}

impl PollerInner {
    /// Runs one cycle whose result only counts while the generation is still
    /// `epoch`.
    async fn tick(&self, epoch: u64) -> TickOutcome {
        let Some(_permit) = self.flight.try_begin() else {
            debug!(dashboard = %self.id, "Request still in flight, dropping tick");
            self.status.write().await.record_skipped();
            return TickOutcome::Skipped;
        };

        if self.generation.load(Ordering::SeqCst) != epoch {
            return self.discard().await;
        }

        let received_at = Utc::now();
        let result = match self.source.fetch().await {
            Ok(body) => self.normalizer.parse_body(&body, received_at),
            Err(e) => Err(e),
        };

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                if self.generation.load(Ordering::SeqCst) != epoch {
                    return self.discard().await;
                }
                info_span!("poll", dashboard = %self.id, source = %self.source.describe())
                    .in_scope(|| e.log());
                self.status.write().await.record_failure(&e);
                return TickOutcome::Failed(e);
            }
        };

        if payload.is_empty() {
            if self.generation.load(Ordering::SeqCst) != epoch {
                return self.discard().await;
            }
            debug!(dashboard = %self.id, "Empty sample list, nothing to apply");
            self.status.write().await.record_no_update();
            return TickOutcome::NoUpdate;
        }

        let finished = payload.is_finished();
        let samples = payload.samples.len();
        {
            let mut state = self.state.write().await;
            // stop() bumps the generation under this lock
            if self.generation.load(Ordering::SeqCst) != epoch {
                drop(state);
                return self.discard().await;
            }
            apply(self.settings.mode, &mut state, &payload.samples);
            let snapshot = state.snapshot();
            self.sink.draw(&snapshot);
        }

        trace!(
            dashboard = %self.id,
            samples = samples,
            mode = %self.settings.mode,
            "Applied poll result"
        );
        self.status.write().await.record_applied();
        TickOutcome::Applied { samples, finished }
    }

    async fn discard(&self) -> TickOutcome {
        debug!(dashboard = %self.id, "Poller stopped mid-flight, discarding response");
        self.status.write().await.record_discarded();
        TickOutcome::Discarded
    }
}

fn apply(mode: ResponseMode, state: &mut DashboardState, samples: &[MetricSample]) {
    match mode {
        ResponseMode::Latest => {
            for sample in samples {
                state.append_sample(sample);
            }
        }
        ResponseMode::History => state.replace_all_samples(samples),
        ResponseMode::Tail => {
            if let Some(last) = samples.last() {
                state.append_sample(last);
            }
        }
    }
}

async fn run_loop(inner: Arc<PollerInner>, mut shutdown_rx: oneshot::Receiver<()>, generation: u64) {
    loop {
        if inner.generation.load(Ordering::SeqCst) != generation {
            break;
        }

        let started = Instant::now();
        let outcome = inner.tick(generation).await;

        if outcome.is_finished() && inner.settings.stop_when_finished {
            info!(dashboard = %inner.id, "Run finished, stopping poller");
            let _lifecycle = inner.lifecycle.lock();
            if inner.generation.load(Ordering::SeqCst) == generation {
                inner.running.store(false, Ordering::SeqCst);
            }
            break;
        }

        let elapsed = started.elapsed();
        let delay = next_delay(inner.settings.interval, elapsed);
        inner.status.write().await.record_timing(elapsed, delay);
        trace!(
            dashboard = %inner.id,
            elapsed_ms = elapsed.as_millis() as u64,
            delay_ms = delay.as_millis() as u64,
            "Scheduling next tick"
        );

        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(dashboard = %inner.id, "Poll loop exited");
}

/// Single-flight, drift-corrected poller feeding one [`DashboardState`].
///
/// Each instance owns its state, source and sink; nothing is shared between
/// pollers unless the caller shares it.
pub struct SamplePoller {
    inner: Arc<PollerInner>,
}

impl SamplePoller {
    pub fn new(
        state: DashboardState,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn RenderSink>,
        normalizer: Normalizer,
        settings: PollerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                id: Uuid::new_v4(),
                state: Arc::new(RwLock::new(state)),
                source,
                sink,
                normalizer,
                settings,
                flight: FlightGuard::new(),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                lifecycle: Mutex::new(Lifecycle::default()),
                status: RwLock::new(PollerStatus::default()),
            }),
        }
    }

    /// Poller for a profile with a dashboard tracking the profile's keys.
    pub fn for_profile(
        profile: &EndpointProfile,
        capacity: usize,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn RenderSink>,
        settings: PollerSettings,
    ) -> Self {
        let state = DashboardState::new(profile.scope(), profile.tracked_keys(), capacity);
        Self::new(state, source, sink, profile.normalizer.clone(), settings)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.inner.settings
    }

    /// Runs one poll cycle now, sharing the single-flight guard with the loop.
    pub async fn tick(&self) -> TickOutcome {
        let epoch = self.inner.generation.load(Ordering::SeqCst);
        self.inner.tick(epoch).await
    }

    /// Starts the tick loop. A second call while running does nothing.
    ///
    /// The loop is bound to the generation current at this call, so a
    /// `stop()` that returns afterwards always invalidates it.
    pub async fn start(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if self
                .inner
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                drop(lifecycle);
                warn!(dashboard = %self.inner.id, "Poller is already running");
                return;
            }

            let generation = self.inner.generation.load(Ordering::SeqCst);
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let inner = Arc::clone(&self.inner);
            lifecycle.shutdown_tx = Some(shutdown_tx);
            lifecycle.task_handle = Some(tokio::spawn(run_loop(inner, shutdown_rx, generation)));
        }

        info!(
            dashboard = %self.inner.id,
            source = %self.inner.source.describe(),
            interval_ms = self.inner.settings.interval.as_millis() as u64,
            mode = %self.inner.settings.mode,
            "Poller started"
        );
    }

    /// Cancels the pending tick. A request already in flight completes but
    /// its result is dropped.
    pub async fn stop(&self) {
        let was_running = {
            // apply() checks the generation under this lock
            let _state = self.inner.state.write().await;
            let mut lifecycle = self.inner.lifecycle.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = lifecycle.shutdown_tx.take() {
                let _ = tx.send(());
            }
            lifecycle.task_handle.take();
            self.inner.running.swap(false, Ordering::SeqCst)
        };

        if was_running {
            info!(dashboard = %self.inner.id, "Poller stopped");
        } else {
            debug!(dashboard = %self.inner.id, "Poller was not running");
        }
    }

    /// Waits for the loop task to exit on its own (e.g. a finished run).
    pub async fn join(&self) {
        let handle = self.inner.lifecycle.lock().task_handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(dashboard = %self.inner.id, error = %e, "Poll loop task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn poll_state(&self) -> PollState {
        self.inner.flight.state()
    }

    /// Shared handle to the dashboard this poller feeds.
    pub fn state(&self) -> Arc<RwLock<DashboardState>> {
        Arc::clone(&self.inner.state)
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.inner.state.read().await.snapshot()
    }

    pub async fn status(&self) -> PollerStatus {
        let mut status = self.inner.status.read().await.clone();
        status.is_running = self.is_running();
        status
    }
}

impl Drop for SamplePoller {
    fn drop(&mut self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if self.inner.running.swap(false, Ordering::SeqCst) {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = lifecycle.shutdown_tx.take() {
                let _ = tx.send(());
            }
        }
    }
}
