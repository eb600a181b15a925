#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core posture monitoring logic (hardware-agnostic).
//!
//! All hardware interactions go through `posture_traits::ImuSensor` and the
//! `AlertActuator` seam; telemetry leaves through `TelemetrySink`.
//!
//! ## Pipeline (one cycle)
//!
//! - **Fault check**: read errors, non-finite, out-of-range and stuck data (`fault`)
//! - **Orientation**: calibrated pitch/roll from the gravity vector (`orientation`)
//! - **Motion**: static/moving gate from gyro magnitude (`motion`)
//! - **Budget**: bounded integrate/decay slouch accumulator (`budget`)
//! - **Escalation**: milestone levels, hysteresis, recovery reward (`alert`)
//! - **Actuation**: phase-table patterns per cue (`pattern`, `actuator`)
//! - **Telemetry**: flat per-cycle `Snapshot` (`snapshot`, `telemetry`)
//!
//! `MonitorCore` owns all session state; `runner::run` drives it at a fixed
//! cadence with the cycle delta measured on a `Clock`.

pub mod actuator;
pub mod alert;
pub mod budget;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fault;
pub mod hw_error;
pub mod mocks;
pub mod monitor;
pub mod motion;
pub mod orientation;
pub mod pattern;
pub mod runner;
pub mod snapshot;
pub mod telemetry;
pub mod util;

pub use actuator::{AlertActuator, BuzzerActuator};
pub use alert::{AlertEscalation, AlertEvent, AlertLevel, AlertState, Milestone, MilestoneTable};
pub use budget::{SlouchBudget, in_bad_posture};
pub use builder::{Missing, Monitor, MonitorBuilder, MonitorG, Set, build_monitor};
pub use calibration::{CalibrationOffset, Calibrator, calibrate};
pub use config::{
    BudgetCfg, CalibrationCfg, FaultCfg, MonitorSettings, MotionCfg, Mount, PostureCfg, Timeouts,
};
pub use error::{BuildError, PostureError, Report, Result};
pub use fault::{FaultDetector, FaultKind};
pub use monitor::MonitorCore;
pub use motion::{MotionClassifier, MotionState};
pub use orientation::{OrientationEstimator, OrientationSample};
pub use pattern::{Cue, Pattern, PhaseAt};
pub use runner::{RunParams, RunSummary};
pub use snapshot::{Snapshot, StatusRecord};
pub use telemetry::{
    ChannelSink, TelemetryError, TelemetryReceiver, TelemetryRecord, TelemetrySink,
};
