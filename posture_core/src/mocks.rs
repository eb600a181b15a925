//! Test and helper mocks for posture_core

use std::sync::{Arc, Mutex};

use posture_traits::{ImuReading, ImuSensor};

use crate::actuator::AlertActuator;
use crate::orientation::tilt_to_accel;
use crate::pattern::Cue;
use crate::snapshot::{Snapshot, StatusRecord};
use crate::telemetry::TelemetrySink;

type BoxErr = Box<dyn std::error::Error + Send + Sync>;
type ReadFn = dyn FnMut(u64) -> Result<ImuReading, BoxErr> + Send;

/// A stationary reading at the given pitch, with gyro magnitude `gyro_dps`
/// on the x axis.
pub fn still_reading(pitch_deg: f32, gyro_dps: f32) -> ImuReading {
    ImuReading::new(tilt_to_accel(pitch_deg, 0.0), [gyro_dps, 0.0, 0.0])
}

/// Sensor driven by a closure of the read index (0-based).
pub struct FnSensor {
    f: Box<ReadFn>,
    reads: u64,
}

impl FnSensor {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(u64) -> Result<ImuReading, BoxErr> + Send + 'static,
    {
        Self {
            f: Box::new(f),
            reads: 0,
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl ImuSensor for FnSensor {
    fn read(&mut self, _timeout: std::time::Duration) -> Result<ImuReading, BoxErr> {
        let i = self.reads;
        self.reads += 1;
        (self.f)(i)
    }
}

/// Actuator that accepts everything and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActuator;

impl AlertActuator for NullActuator {
    fn render(&mut self, _cue: Cue, _elapsed_ms: u64) -> Result<(), BoxErr> {
        Ok(())
    }
    fn off(&mut self) -> Result<(), BoxErr> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Render(Cue, u64),
    Off,
}

/// Records every call; clones share the log.
#[derive(Debug, Default, Clone)]
pub struct RecordingActuator {
    log: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl RecordingActuator {
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.log.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.log.lock() {
            v.clear();
        }
    }

    fn push(&self, call: ActuatorCall) -> Result<(), BoxErr> {
        self.log
            .lock()
            .map_err(|_| "actuator log poisoned")?
            .push(call);
        Ok(())
    }
}

impl AlertActuator for RecordingActuator {
    fn render(&mut self, cue: Cue, elapsed_ms: u64) -> Result<(), BoxErr> {
        self.push(ActuatorCall::Render(cue, elapsed_ms))
    }
    fn off(&mut self) -> Result<(), BoxErr> {
        self.push(ActuatorCall::Off)
    }
}

/// Discards all telemetry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&mut self, _snapshot: &Snapshot) -> Result<(), BoxErr> {
        Ok(())
    }
}

/// Keeps all telemetry in memory.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    pub snapshots: Vec<Snapshot>,
    pub statuses: Vec<StatusRecord>,
}

impl TelemetrySink for VecSink {
    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), BoxErr> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
    fn status(&mut self, record: &StatusRecord) -> Result<(), BoxErr> {
        self.statuses.push(record.clone());
        Ok(())
    }
}
