//! Telemetry sink seam and a bounded-channel publisher.
//!
//! Snapshots are handed over by value, so a consumer on another thread only
//! ever sees complete cycles. When the consumer falls behind, snapshots are
//! dropped and counted rather than stalling the monitor loop; lifecycle
//! status records are never dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use serde::Serialize;
use thiserror::Error;

use crate::snapshot::{Snapshot, StatusRecord};

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Every receiver is gone; nothing published from now on is seen.
    #[error("telemetry consumer disconnected")]
    Disconnected,
}

impl TelemetryError {
    /// True when `err` is a consumer disconnect from any sink.
    pub fn is_disconnect(err: &(dyn std::error::Error + 'static)) -> bool {
        matches!(
            err.downcast_ref::<TelemetryError>(),
            Some(TelemetryError::Disconnected)
        )
    }
}

pub trait TelemetrySink {
    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), BoxErr>;

    fn status(&mut self, _record: &StatusRecord) -> Result<(), BoxErr> {
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), BoxErr> {
        (**self).publish(snapshot)
    }
    fn status(&mut self, record: &StatusRecord) -> Result<(), BoxErr> {
        (**self).status(record)
    }
}

/// One line of the telemetry stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryRecord {
    Status(StatusRecord),
    Snapshot(Snapshot),
}

pub struct ChannelSink {
    tx: xch::Sender<TelemetryRecord>,
    dropped: Arc<AtomicU64>,
}

pub struct TelemetryReceiver {
    rx: xch::Receiver<TelemetryRecord>,
    dropped: Arc<AtomicU64>,
}

/// Bounded publisher/consumer pair. `capacity` is clamped to at least 1.
pub fn channel(capacity: usize) -> (ChannelSink, TelemetryReceiver) {
    let (tx, rx) = xch::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ChannelSink {
            tx,
            dropped: dropped.clone(),
        },
        TelemetryReceiver { rx, dropped },
    )
}

impl ChannelSink {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), BoxErr> {
        match self.tx.try_send(TelemetryRecord::Snapshot(snapshot.clone())) {
            Ok(()) => Ok(()),
            Err(xch::TrySendError::Full(_)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if n.is_power_of_two() {
                    tracing::warn!(dropped = n, "telemetry consumer lagging; snapshots dropped");
                }
                Ok(())
            }
            Err(xch::TrySendError::Disconnected(_)) => Err(TelemetryError::Disconnected.into()),
        }
    }

    fn status(&mut self, record: &StatusRecord) -> Result<(), BoxErr> {
        self.tx
            .send(TelemetryRecord::Status(record.clone()))
            .map_err(|_| TelemetryError::Disconnected.into())
    }
}

impl TelemetryReceiver {
    /// Blocks until a record arrives; `None` once every sender is gone.
    pub fn recv(&self) -> Option<TelemetryRecord> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TelemetryRecord> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drains until every sender is gone.
    pub fn iter(&self) -> impl Iterator<Item = TelemetryRecord> + '_ {
        self.rx.iter()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
