//! Per-cycle telemetry records.
//!
//! `emit` is a pure aggregation run after every other component has settled
//! for the cycle; a `Snapshot` never reflects a partially updated cycle.

use serde::Serialize;

use crate::alert::{AlertEvent, AlertState, MilestoneTable};
use crate::budget::SlouchBudget;
use crate::calibration::CalibrationOffset;
use crate::fault::FaultKind;
use crate::motion::MotionState;
use crate::orientation::OrientationSample;
use crate::util::whole_secs;

/// Flat record, one per cycle. Orientation and gyro fields are `null` on a
/// faulted cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cycle: u64,
    /// Milliseconds since the session started.
    pub timestamp: u64,
    pub delta_ms: u64,
    pub pitch: Option<f32>,
    pub roll: Option<f32>,
    pub pitch_raw: Option<f32>,
    pub roll_raw: Option<f32>,
    pub gyro_x: Option<f32>,
    pub gyro_y: Option<f32>,
    pub gyro_z: Option<f32>,
    pub gyro_magnitude: Option<f32>,
    pub is_moving: bool,
    pub cumulative_slouch_ms: u64,
    pub cumulative_slouch_s: u64,
    /// Highest milestone the budget has reached, 0 below the first.
    pub current_milestone_s: u64,
    /// Next milestone above the budget; `null` past the last one.
    pub next_milestone_s: Option<u64>,
    pub threshold: f32,
    pub slouch: bool,
    pub alert_active: bool,
    pub alert_level: u8,
    pub alert_level_name: &'static str,
    pub was_critical: bool,
    pub alert_event: Option<&'static str>,
    pub fault: Option<FaultKind>,
}

/// Everything `emit` reads. Borrowed; nothing is mutated.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInput<'a> {
    pub cycle: u64,
    pub timestamp_ms: u64,
    pub delta_ms: u64,
    pub orientation: Option<&'a OrientationSample>,
    pub motion: Option<&'a MotionState>,
    pub budget: &'a SlouchBudget,
    pub alert: &'a AlertState,
    pub milestones: &'a MilestoneTable,
    pub threshold_deg: f32,
    pub in_bad_posture: bool,
    pub event: Option<&'a AlertEvent>,
    pub fault: Option<FaultKind>,
}

pub fn emit(input: &SnapshotInput<'_>) -> Snapshot {
    let cumulative = input.budget.cumulative_ms();
    let table = input.milestones;
    let current_ms = table
        .index_for(cumulative)
        .and_then(|i| table.get(i))
        .map_or(0, |m| m.at_ms);
    let gyro = input.motion.map(|m| m.gyro_dps);
    Snapshot {
        cycle: input.cycle,
        timestamp: input.timestamp_ms,
        delta_ms: input.delta_ms,
        pitch: input.orientation.map(|o| o.pitch),
        roll: input.orientation.map(|o| o.roll),
        pitch_raw: input.orientation.map(|o| o.pitch_raw),
        roll_raw: input.orientation.map(|o| o.roll_raw),
        gyro_x: gyro.map(|g| g[0]),
        gyro_y: gyro.map(|g| g[1]),
        gyro_z: gyro.map(|g| g[2]),
        gyro_magnitude: input.motion.map(|m| m.gyro_magnitude_dps),
        is_moving: input.motion.is_some_and(|m| m.is_moving),
        cumulative_slouch_ms: cumulative,
        cumulative_slouch_s: whole_secs(cumulative),
        current_milestone_s: whole_secs(current_ms),
        next_milestone_s: table.next_after(cumulative).map(|m| whole_secs(m.at_ms)),
        threshold: input.threshold_deg,
        slouch: input.in_bad_posture,
        alert_active: input.alert.active,
        alert_level: input.alert.level.ordinal(),
        alert_level_name: input.alert.level.name(),
        was_critical: input.alert.was_critical_recently,
        alert_event: input.event.map(AlertEvent::name),
        fault: input.fault,
    }
}

/// Lifecycle records written to the same stream as snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusRecord {
    Initialized { version: &'static str },
    Calibrating { samples: usize },
    Calibrated { pitch_offset: f32, roll_offset: f32 },
    Fault { message: String },
}

impl From<CalibrationOffset> for StatusRecord {
    fn from(o: CalibrationOffset) -> Self {
        StatusRecord::Calibrated {
            pitch_offset: o.pitch_offset_deg,
            roll_offset: o.roll_offset_deg,
        }
    }
}
