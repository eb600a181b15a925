//! Neutral-posture calibration.
//!
//! The wearer holds a neutral posture while a short burst of samples is
//! averaged into pitch/roll offsets. Whether the wearer actually was neutral
//! cannot be detected here; that is a precondition of the procedure.

use std::time::Duration;

use posture_traits::{Clock, ImuSensor};
use serde::Serialize;

use crate::config::{CalibrationCfg, FaultCfg};
use crate::error::{PostureError, Result};
use crate::fault::reading_fault;
use crate::hw_error::map_hw_error;
use crate::orientation::raw_angles;

/// Neutral-position offsets in degrees, measured in the raw sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CalibrationOffset {
    pub pitch_offset_deg: f32,
    pub roll_offset_deg: f32,
}

/// Running mean of raw tilt angles.
#[derive(Debug, Clone)]
pub struct Calibrator {
    target: usize,
    sum_pitch: f64,
    sum_roll: f64,
    accepted: usize,
    rejected: usize,
}

impl Calibrator {
    pub fn new(target: usize) -> Self {
        Self {
            target: target.max(1),
            sum_pitch: 0.0,
            sum_roll: 0.0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Add one accel sample. Returns false (and counts a rejection) when the
    /// derived angles are not finite.
    pub fn push(&mut self, accel_g: [f32; 3]) -> bool {
        let (pitch, roll) = raw_angles(accel_g);
        if !(pitch.is_finite() && roll.is_finite()) {
            self.rejected += 1;
            return false;
        }
        self.sum_pitch += f64::from(pitch);
        self.sum_roll += f64::from(roll);
        self.accepted += 1;
        true
    }

    /// Count a sample that never arrived or was discarded upstream.
    pub fn reject(&mut self) {
        self.rejected += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.accepted + self.rejected >= self.target
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn finish(self) -> std::result::Result<CalibrationOffset, PostureError> {
        if self.accepted == 0 {
            return Err(PostureError::Calibration(format!(
                "no valid samples out of {}",
                self.accepted + self.rejected
            )));
        }
        let n = self.accepted as f64;
        Ok(CalibrationOffset {
            pitch_offset_deg: (self.sum_pitch / n) as f32,
            roll_offset_deg: (self.sum_roll / n) as f32,
        })
    }
}

/// Blocking calibration burst: `cfg.samples` reads spaced `cfg.interval_ms`
/// apart. Failed, non-finite and out-of-range reads are skipped; the call
/// fails only if none were usable.
pub fn calibrate<S: ImuSensor + ?Sized>(
    sensor: &mut S,
    clock: &dyn Clock,
    cfg: &CalibrationCfg,
    limits: &FaultCfg,
    timeout: Duration,
) -> Result<CalibrationOffset> {
    let mut cal = Calibrator::new(cfg.samples);
    let interval = Duration::from_millis(cfg.interval_ms);
    while !cal.is_complete() {
        match sensor.read(timeout) {
            Ok(reading) => {
                if let Some(kind) = reading_fault(&reading, limits) {
                    tracing::debug!(fault = %kind, "calibration sample discarded");
                    cal.reject();
                } else {
                    cal.push(reading.accel_g);
                }
            }
            Err(e) => {
                let mapped = map_hw_error(&*e);
                tracing::warn!(error = %mapped, "calibration read failed");
                cal.reject();
            }
        }
        if !cal.is_complete() {
            clock.sleep(interval);
        }
    }
    let (accepted, rejected) = (cal.accepted(), cal.rejected());
    let offset = cal.finish()?;
    tracing::info!(
        pitch_offset = offset.pitch_offset_deg,
        roll_offset = offset.roll_offset_deg,
        accepted,
        rejected,
        "calibrated"
    );
    Ok(offset)
}
