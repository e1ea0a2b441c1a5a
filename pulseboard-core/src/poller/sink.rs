use std::sync::Arc;
use tokio::sync::watch;

use crate::models::DashboardSnapshot;

/// Receives one snapshot per applied tick and redraws.
///
/// Called while the dashboard is locked, so implementations should hand the
/// snapshot off rather than block.
pub trait RenderSink: Send + Sync {
    fn draw(&self, snapshot: &DashboardSnapshot);
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn draw(&self, _snapshot: &DashboardSnapshot) {}
}

/// Publishes the latest snapshot on a `watch` channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: watch::Sender<Option<Arc<DashboardSnapshot>>>,
}

impl ChannelSink {
    pub fn channel() -> (Self, watch::Receiver<Option<Arc<DashboardSnapshot>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DashboardSnapshot>>> {
        self.tx.subscribe()
    }
}

impl RenderSink for ChannelSink {
    fn draw(&self, snapshot: &DashboardSnapshot) {
        self.tx.send_replace(Some(Arc::new(snapshot.clone())));
    }
}
