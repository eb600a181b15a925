//! Type-state builder for `Monitor` and generic `build_monitor` constructor.
//!
//! The builder enforces at compile time that a sensor and an actuator are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use posture_traits::{Clock, ImuSensor, MonotonicClock};

use crate::actuator::AlertActuator;
use crate::alert::{AlertState, MilestoneTable};
use crate::budget::SlouchBudget;
use crate::calibration::CalibrationOffset;
use crate::config::*;
use crate::error::{BuildError, Result};
use crate::monitor::MonitorCore;
use crate::runner::{RunParams, RunSummary};
use crate::snapshot::Snapshot;
use crate::telemetry::TelemetrySink;

// ── Public dynamic-dispatch wrapper ──────────────────────────────────────────

/// Boxed monitor, as produced by `MonitorBuilder`.
pub struct Monitor {
    pub(crate) inner: MonitorCore<Box<dyn ImuSensor>, Box<dyn AlertActuator>>,
}

impl core::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.inner, f)
    }
}

impl Monitor {
    pub fn builder() -> MonitorBuilder<Missing, Missing> {
        MonitorBuilder::default()
    }

    /// Blocking calibration, then a fresh session.
    pub fn begin(&mut self) -> Result<CalibrationOffset> {
        self.inner.begin()
    }

    pub fn begin_with_offset(&mut self, offset: CalibrationOffset) {
        self.inner.begin_with_offset(offset);
    }

    /// One full cycle.
    pub fn step(&mut self) -> Result<Snapshot> {
        self.inner.step()
    }

    pub fn recalibrate(&mut self) -> Result<CalibrationOffset> {
        self.inner.recalibrate()
    }

    pub fn silence(&mut self) -> Result<()> {
        self.inner.silence()
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.inner.offset()
    }

    pub fn budget(&self) -> &SlouchBudget {
        self.inner.budget()
    }

    pub fn alert_state(&self) -> &AlertState {
        self.inner.alert_state()
    }

    pub fn settings(&self) -> &MonitorSettings {
        self.inner.settings()
    }

    /// Calibrate, then loop until `shutdown` or the cycle limit.
    pub fn run<K: TelemetrySink + ?Sized>(
        &mut self,
        sink: &mut K,
        params: &RunParams,
        shutdown: &AtomicBool,
    ) -> Result<RunSummary> {
        crate::runner::run(&mut self.inner, sink, params, shutdown)
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct MonitorBuilder<S, A> {
    sensor: Option<Box<dyn ImuSensor>>,
    actuator: Option<Box<dyn AlertActuator>>,
    settings: MonitorSettings,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    recalibrate_check: Option<Box<dyn FnMut() -> bool>>,
    _s: PhantomData<S>,
    _a: PhantomData<A>,
}

impl Default for MonitorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            actuator: None,
            settings: MonitorSettings::default(),
            clock: None,
            recalibrate_check: None,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

fn invalid<T>(msg: &'static str) -> Result<T> {
    Err(eyre::Report::new(BuildError::InvalidConfig(msg)))
}

/// Validate settings and construct a `MonitorCore`.
///
/// Shared by `MonitorBuilder::try_build()` and `build_monitor()`.
fn validate_and_build<S: ImuSensor, A: AlertActuator>(
    sensor: S,
    actuator: A,
    settings: MonitorSettings,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    recalibrate_check: Option<Box<dyn FnMut() -> bool>>,
) -> Result<MonitorCore<S, A>> {
    let p = &settings.posture;
    if !(p.threshold_deg.is_finite() && p.threshold_deg > 0.0 && p.threshold_deg < 90.0) {
        return invalid("threshold_deg must be in (0, 90)");
    }
    if !(p.hysteresis_deg.is_finite() && p.hysteresis_deg >= 0.0) {
        return invalid("hysteresis_deg must be >= 0");
    }
    if p.hysteresis_deg >= p.threshold_deg {
        return invalid("hysteresis_deg must be < threshold_deg");
    }
    let g = settings.motion.gyro_threshold_dps;
    if !(g.is_finite() && g > 0.0) {
        return invalid("gyro_threshold_dps must be > 0");
    }
    if settings.budget.window_ms == 0 {
        return invalid("window_ms must be > 0");
    }
    if settings.milestones.last_at_ms() > settings.budget.window_ms {
        return invalid("milestones exceed the budget window");
    }
    if settings.calibration.samples == 0 {
        return invalid("calibration samples must be > 0");
    }
    if settings.timeouts.sensor_ms == 0 {
        return invalid("sensor_ms must be >= 1");
    }
    let f = &settings.fault;
    if !(f.max_accel_g > 0.0 && f.max_gyro_dps > 0.0) {
        return invalid("fault limits must be > 0");
    }
    if !(f.min_accel_g >= 0.0 && f.min_accel_g < f.max_accel_g) {
        return invalid("fault min_accel_g must be >= 0 and below max_accel_g");
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    Ok(MonitorCore::new(
        sensor,
        actuator,
        settings,
        clock,
        recalibrate_check,
    ))
}

impl<S, A> MonitorBuilder<S, A> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Monitor> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let inner = validate_and_build(
            sensor,
            actuator,
            self.settings,
            self.clock,
            self.recalibrate_check,
        )?;
        Ok(Monitor { inner })
    }
}

/// Chainable setters that do not affect type-state.
impl<S, A> MonitorBuilder<S, A> {
    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }
    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.settings.mount = mount;
        self
    }
    pub fn with_posture(mut self, posture: PostureCfg) -> Self {
        self.settings.posture = posture;
        self
    }
    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.settings.motion = motion;
        self
    }
    pub fn with_budget(mut self, budget: BudgetCfg) -> Self {
        self.settings.budget = budget;
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.settings.calibration = calibration;
        self
    }
    pub fn with_fault(mut self, fault: FaultCfg) -> Self {
        self.settings.fault = fault;
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.settings.timeouts = timeouts;
        self
    }
    pub fn with_milestones(mut self, milestones: MilestoneTable) -> Self {
        self.settings.milestones = milestones;
        self
    }
    /// Polled at the start of every cycle; `true` triggers recalibration.
    pub fn with_recalibrate_check<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        self.recalibrate_check = Some(Box::new(f));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<A> MonitorBuilder<Missing, A> {
    pub fn with_sensor(self, sensor: impl ImuSensor + 'static) -> MonitorBuilder<Set, A> {
        MonitorBuilder {
            sensor: Some(Box::new(sensor)),
            actuator: self.actuator,
            settings: self.settings,
            clock: self.clock,
            recalibrate_check: self.recalibrate_check,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

impl<S> MonitorBuilder<S, Missing> {
    pub fn with_actuator(
        self,
        actuator: impl AlertActuator + 'static,
    ) -> MonitorBuilder<S, Set> {
        MonitorBuilder {
            sensor: self.sensor,
            actuator: Some(Box::new(actuator)),
            settings: self.settings,
            clock: self.clock,
            recalibrate_check: self.recalibrate_check,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

impl MonitorBuilder<Set, Set> {
    /// Validate and build. Only available once sensor and actuator are set.
    pub fn build(self) -> Result<Monitor> {
        self.try_build()
    }
}

/// Generic, statically-dispatched alias using the unified core.
pub type MonitorG<S, A> = MonitorCore<S, A>;

/// Build a statically-dispatched monitor from concrete sensor and actuator.
pub fn build_monitor<S, A>(
    sensor: S,
    actuator: A,
    settings: MonitorSettings,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<MonitorG<S, A>>
where
    S: ImuSensor + 'static,
    A: AlertActuator + 'static,
{
    validate_and_build(sensor, actuator, settings, clock, None)
}
