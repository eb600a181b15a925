//! Sensor fault detection.
//!
//! A cycle is faulted when the read fails, when the reading is not finite,
//! when any axis is outside the device's physical range, when the
//! accelerometer does not see gravity at all, or when the sensor
//! has returned bit-identical data for too long (a frozen register file
//! looks like a perfectly still wearer otherwise).

use std::fmt;

use posture_traits::ImuReading;
use serde::Serialize;

use crate::config::FaultCfg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    SensorUnavailable,
    NumericDegenerate,
    OutOfRange,
    Stuck,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::SensorUnavailable => "sensor_unavailable",
            FaultKind::NumericDegenerate => "numeric_degenerate",
            FaultKind::OutOfRange => "out_of_range",
            FaultKind::Stuck => "stuck",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-reading checks that need no history.
pub fn reading_fault(reading: &ImuReading, limits: &FaultCfg) -> Option<FaultKind> {
    let all = reading.accel_g.iter().chain(reading.gyro_dps.iter());
    if all.clone().any(|v| !v.is_finite()) {
        return Some(FaultKind::NumericDegenerate);
    }
    let accel_out = reading.accel_g.iter().any(|v| v.abs() > limits.max_accel_g);
    let gyro_out = reading
        .gyro_dps
        .iter()
        .any(|v| v.abs() > limits.max_gyro_dps);
    let [ax, ay, az] = reading.accel_g;
    let weightless = (ax * ax + ay * ay + az * az).sqrt() < limits.min_accel_g;
    if accel_out || gyro_out || weightless {
        return Some(FaultKind::OutOfRange);
    }
    None
}

fn bits(r: &ImuReading) -> [u32; 6] {
    let [ax, ay, az] = r.accel_g;
    let [gx, gy, gz] = r.gyro_dps;
    [
        ax.to_bits(),
        ay.to_bits(),
        az.to_bits(),
        gx.to_bits(),
        gy.to_bits(),
        gz.to_bits(),
    ]
}

/// Stateful detector; call `observe` once per cycle.
#[derive(Debug, Clone)]
pub struct FaultDetector {
    limits: FaultCfg,
    last_bits: Option<[u32; 6]>,
    identical_run: u32,
    active: Option<FaultKind>,
    total: u64,
}

impl FaultDetector {
    pub fn new(limits: FaultCfg) -> Self {
        Self {
            limits,
            last_bits: None,
            identical_run: 0,
            active: None,
            total: 0,
        }
    }

    pub fn limits(&self) -> &FaultCfg {
        &self.limits
    }

    /// Fault of the most recent cycle, if any.
    pub fn active(&self) -> Option<FaultKind> {
        self.active
    }

    /// Number of faulted cycles seen.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// `None` reading means the read itself failed.
    pub fn observe(&mut self, reading: Option<&ImuReading>) -> Option<FaultKind> {
        let kind = match reading {
            None => {
                self.last_bits = None;
                self.identical_run = 0;
                Some(FaultKind::SensorUnavailable)
            }
            Some(r) => reading_fault(r, &self.limits).or_else(|| self.track_stuck(r)),
        };
        self.transition(kind);
        kind
    }

    fn track_stuck(&mut self, reading: &ImuReading) -> Option<FaultKind> {
        let b = bits(reading);
        if self.last_bits == Some(b) {
            self.identical_run = self.identical_run.saturating_add(1);
        } else {
            self.last_bits = Some(b);
            self.identical_run = 1;
        }
        let limit = self.limits.stuck_cycles;
        (limit > 0 && self.identical_run >= limit).then_some(FaultKind::Stuck)
    }

    fn transition(&mut self, kind: Option<FaultKind>) {
        if kind.is_some() {
            self.total += 1;
        }
        match (self.active, kind) {
            (None, Some(k)) => tracing::warn!(fault = %k, "sensor fault"),
            (Some(prev), Some(k)) if prev != k => {
                tracing::warn!(fault = %k, previous = %prev, "sensor fault changed");
            }
            (Some(prev), None) => tracing::info!(fault = %prev, "sensor fault cleared"),
            _ => {}
        }
        self.active = kind;
    }
}
