//! Fixed-cadence monitor loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use posture_traits::{Clock, ImuSensor};

use crate::actuator::AlertActuator;
use crate::alert::{AlertEvent, AlertLevel};
use crate::error::Result;
use crate::monitor::MonitorCore;
use crate::snapshot::StatusRecord;
use crate::telemetry::{TelemetryError, TelemetrySink};
use crate::util::remaining_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    /// Target cycle period. Reference cadence is 100 ms (10 Hz).
    pub period_ms: u64,
    /// Stop after this many cycles; `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            period_ms: 100,
            max_cycles: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub fault_cycles: u64,
    pub activations: u64,
    pub recoveries: u64,
    /// Cycles whose work took the whole period or longer.
    pub overruns: u64,
    pub final_level: AlertLevel,
    pub final_budget_ms: u64,
}

fn send_status<K: TelemetrySink + ?Sized>(sink: &mut K, record: &StatusRecord) {
    if let Err(e) = sink.status(record) {
        tracing::warn!(error = %e, "status publish failed");
    }
}

/// Calibrate, then step/publish/sleep until `shutdown` is set,
/// `params.max_cycles` is reached, or the telemetry consumer disconnects.
/// Only a failed startup calibration ends the run with an error.
pub fn run<S, A, K>(
    monitor: &mut MonitorCore<S, A>,
    sink: &mut K,
    params: &RunParams,
    shutdown: &AtomicBool,
) -> Result<RunSummary>
where
    S: ImuSensor,
    A: AlertActuator,
    K: TelemetrySink + ?Sized,
{
    send_status(
        sink,
        &StatusRecord::Initialized {
            version: env!("CARGO_PKG_VERSION"),
        },
    );
    send_status(
        sink,
        &StatusRecord::Calibrating {
            samples: monitor.settings().calibration.samples,
        },
    );
    let offset = match monitor.begin() {
        Ok(o) => o,
        Err(e) => {
            send_status(
                sink,
                &StatusRecord::Fault {
                    message: format!("{e:#}"),
                },
            );
            return Err(e);
        }
    };
    send_status(sink, &offset.into());

    let clock: Arc<dyn Clock + Send + Sync> = monitor.clock();
    let period = params.period_ms.max(1);
    let mut summary = RunSummary::default();
    tracing::info!(period_ms = period, max_cycles = ?params.max_cycles, "monitor loop start");

    while !shutdown.load(Ordering::Relaxed) {
        if params.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }
        let started = clock.now();
        let snapshot = monitor.step().wrap_err("monitor cycle")?;
        if let Some(o) = monitor.take_recalibration() {
            send_status(sink, &o.into());
        }

        summary.cycles += 1;
        match monitor.last_event() {
            Some(AlertEvent::Activated { .. }) => summary.activations += 1,
            Some(AlertEvent::Recovered { .. }) => summary.recoveries += 1,
            _ => {}
        }
        if let Err(e) = sink.publish(&snapshot) {
            if TelemetryError::is_disconnect(&*e) {
                tracing::warn!(cycle = snapshot.cycle, "telemetry consumer gone; stopping monitor");
                break;
            }
            tracing::warn!(error = %e, cycle = snapshot.cycle, "snapshot publish failed");
        }

        let spent = clock.ms_since(started);
        match remaining_ms(period, spent) {
            0 => {
                summary.overruns += 1;
                tracing::debug!(spent_ms = spent, period_ms = period, "cycle overran period");
            }
            rest => clock.sleep(Duration::from_millis(rest)),
        }
    }

    if let Err(e) = monitor.silence() {
        tracing::warn!(error = %e, "failed to silence actuator at shutdown");
    }
    summary.fault_cycles = monitor.fault_cycles();
    summary.final_level = monitor.alert_state().level;
    summary.final_budget_ms = monitor.budget().cumulative_ms();
    tracing::info!(
        cycles = summary.cycles,
        activations = summary.activations,
        recoveries = summary.recoveries,
        fault_cycles = summary.fault_cycles,
        final_level = %summary.final_level,
        "monitor loop stopped"
    );
    Ok(summary)
}
