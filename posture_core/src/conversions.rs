//! Conversions from `posture_config` file types to `posture_core` runtime types.

use crate::alert::{AlertLevel, Milestone, MilestoneTable};
use crate::config::{
    BudgetCfg, CalibrationCfg, FaultCfg, MonitorSettings, MotionCfg, Mount, PostureCfg, Timeouts,
};
use crate::error::BuildError;

impl From<posture_config::Mount> for Mount {
    fn from(m: posture_config::Mount) -> Self {
        match m {
            posture_config::Mount::Neck => Mount::Neck,
            posture_config::Mount::Hat => Mount::Hat,
        }
    }
}

impl From<posture_config::LevelName> for AlertLevel {
    fn from(l: posture_config::LevelName) -> Self {
        match l {
            posture_config::LevelName::Gentle => AlertLevel::Gentle,
            posture_config::LevelName::Warning => AlertLevel::Warning,
            posture_config::LevelName::Urgent => AlertLevel::Urgent,
            posture_config::LevelName::Critical => AlertLevel::Critical,
        }
    }
}

impl From<&posture_config::PostureCfg> for PostureCfg {
    fn from(c: &posture_config::PostureCfg) -> Self {
        Self {
            threshold_deg: c.threshold_deg,
            hysteresis_deg: c.hysteresis_deg,
        }
    }
}

impl From<&posture_config::MotionCfg> for MotionCfg {
    fn from(c: &posture_config::MotionCfg) -> Self {
        Self {
            gyro_threshold_dps: c.gyro_threshold_dps,
        }
    }
}

impl From<&posture_config::BudgetCfg> for BudgetCfg {
    fn from(c: &posture_config::BudgetCfg) -> Self {
        Self {
            window_ms: c.window_ms,
        }
    }
}

impl From<&posture_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &posture_config::CalibrationCfg) -> Self {
        Self {
            samples: c.samples,
            interval_ms: c.interval_ms,
        }
    }
}

impl From<&posture_config::FaultCfg> for FaultCfg {
    fn from(c: &posture_config::FaultCfg) -> Self {
        Self {
            stuck_cycles: c.stuck_cycles,
            min_accel_g: c.min_accel_g,
            max_accel_g: c.max_accel_g,
            max_gyro_dps: c.max_gyro_dps,
        }
    }
}

impl From<&posture_config::SensorCfg> for Timeouts {
    fn from(c: &posture_config::SensorCfg) -> Self {
        Self {
            sensor_ms: c.read_timeout_ms,
        }
    }
}

impl TryFrom<&posture_config::AlertsCfg> for MilestoneTable {
    type Error = BuildError;

    fn try_from(c: &posture_config::AlertsCfg) -> Result<Self, Self::Error> {
        match c.profile {
            posture_config::AlertProfile::Progressive => Ok(Self::progressive()),
            posture_config::AlertProfile::Testing => Ok(Self::testing()),
            posture_config::AlertProfile::Custom => Self::new(
                c.milestones
                    .iter()
                    .map(|&(at_ms, level)| Milestone {
                        at_ms,
                        level: level.into(),
                    })
                    .collect(),
            ),
        }
    }
}

impl TryFrom<&posture_config::Config> for MonitorSettings {
    type Error = BuildError;

    fn try_from(c: &posture_config::Config) -> Result<Self, Self::Error> {
        Ok(Self {
            mount: c.sensor.mount.into(),
            posture: (&c.posture).into(),
            motion: (&c.motion).into(),
            budget: (&c.budget).into(),
            calibration: (&c.calibration).into(),
            fault: (&c.fault).into(),
            timeouts: (&c.sensor).into(),
            milestones: MilestoneTable::try_from(&c.alerts)?,
        })
    }
}
