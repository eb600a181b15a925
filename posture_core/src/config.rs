//! Configuration types for the monitor.
//!
//! These are the runtime configuration structs used by `Monitor`.
//! They are separate from the TOML-deserialized config in `posture_config`.

use crate::alert::MilestoneTable;

/// Physical mounting of the IMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mount {
    /// Clip on the back of the neck, z axis up.
    #[default]
    Neck,
    /// Under the brim of a hat; the board sits inverted so angles flip sign.
    Hat,
}

impl Mount {
    #[inline]
    pub fn inverted(self) -> bool {
        matches!(self, Mount::Hat)
    }
}

/// Posture thresholds, relative to the calibrated neutral.
#[derive(Debug, Clone)]
pub struct PostureCfg {
    /// `|pitch| > threshold_deg` is bad posture. Default: 15°.
    pub threshold_deg: f32,
    /// Non-critical alerts relax below `threshold_deg - hysteresis_deg`. Default: 2°.
    pub hysteresis_deg: f32,
}

impl Default for PostureCfg {
    fn default() -> Self {
        Self {
            threshold_deg: 15.0,
            hysteresis_deg: 2.0,
        }
    }
}

/// Motion gate for budget accumulation.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Gyro magnitude above this (°/s) counts as moving. Default: 20.
    pub gyro_threshold_dps: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            gyro_threshold_dps: 20.0,
        }
    }
}

/// Slouch budget bounds.
#[derive(Debug, Clone)]
pub struct BudgetCfg {
    /// Upper clamp of the accumulator in ms. Default: 15 minutes.
    pub window_ms: u64,
}

impl Default for BudgetCfg {
    fn default() -> Self {
        Self { window_ms: 900_000 }
    }
}

/// Startup calibration burst.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub samples: usize,
    pub interval_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 50,
            interval_ms: 20,
        }
    }
}

/// Sensor fault detection limits.
#[derive(Debug, Clone)]
pub struct FaultCfg {
    /// Consecutive bit-identical readings that mark the sensor stuck. 0 disables.
    pub stuck_cycles: u32,
    /// An accel vector shorter than this (g) is out of range; a worn
    /// sensor always sees gravity.
    pub min_accel_g: f32,
    /// Any accel axis beyond this magnitude (g) is out of range.
    pub max_accel_g: f32,
    /// Any gyro axis beyond this magnitude (°/s) is out of range.
    pub max_gyro_dps: f32,
}

impl Default for FaultCfg {
    fn default() -> Self {
        Self {
            stuck_cycles: 50,
            min_accel_g: 0.3,
            max_accel_g: 16.0,
            max_gyro_dps: 2000.0,
        }
    }
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Max sensor wait per read (ms).
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 50 }
    }
}

/// Everything the monitor needs besides its hardware.
#[derive(Debug, Clone, Default)]
pub struct MonitorSettings {
    pub mount: Mount,
    pub posture: PostureCfg,
    pub motion: MotionCfg,
    pub budget: BudgetCfg,
    pub calibration: CalibrationCfg,
    pub fault: FaultCfg,
    pub timeouts: Timeouts,
    pub milestones: MilestoneTable,
}
