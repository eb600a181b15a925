//! The per-cycle pipeline (`MonitorCore`).
//!
//! Owns every piece of session state: calibration offset, slouch budget,
//! alert state, fault detector and cycle timing. One `step()` runs a full
//! pass (read, fault check, estimate, classify, integrate, escalate, drive
//! actuator, emit) to completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use posture_traits::{Clock, ImuSensor};

use crate::actuator::AlertActuator;
use crate::alert::{AlertEscalation, AlertEvent, AlertState, MilestoneTable};
use crate::budget::{SlouchBudget, in_bad_posture};
use crate::calibration::{CalibrationOffset, calibrate};
use crate::config::MonitorSettings;
use crate::error::{PostureError, Result};
use crate::fault::FaultDetector;
use crate::hw_error::map_hw_error;
use crate::motion::MotionClassifier;
use crate::orientation::OrientationEstimator;
use crate::pattern::{Cue, Pattern, PhaseAt};
use crate::snapshot::{Snapshot, SnapshotInput, emit};

/// Unified core for both dynamic (boxed) and generic (static dispatch) variants.
pub struct MonitorCore<S: ImuSensor, A: AlertActuator> {
    pub(crate) sensor: S,
    pub(crate) actuator: A,
    pub(crate) settings: MonitorSettings,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,

    pub(crate) estimator: OrientationEstimator,
    pub(crate) motion: MotionClassifier,
    pub(crate) budget: SlouchBudget,
    pub(crate) alert: AlertEscalation,
    pub(crate) faults: FaultDetector,

    pub(crate) started: bool,
    pub(crate) cycle: u64,
    pub(crate) last_cycle_ms: u64,
    pub(crate) last_event: Option<AlertEvent>,
    pub(crate) recovery_started_ms: Option<u64>,
    pub(crate) actuator_engaged: bool,
    pub(crate) recalibrate_check: Option<Box<dyn FnMut() -> bool>>,
    pub(crate) recalibrated: Option<CalibrationOffset>,
}

impl<S: ImuSensor, A: AlertActuator> core::fmt::Debug for MonitorCore<S, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MonitorCore")
            .field("cycle", &self.cycle)
            .field("offset", &self.estimator.offset())
            .field("cumulative_ms", &self.budget.cumulative_ms())
            .field("alert", self.alert.state())
            .finish()
    }
}

impl<S: ImuSensor, A: AlertActuator> MonitorCore<S, A> {
    pub(crate) fn new(
        sensor: S,
        actuator: A,
        settings: MonitorSettings,
        clock: Arc<dyn Clock + Send + Sync>,
        recalibrate_check: Option<Box<dyn FnMut() -> bool>>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            sensor,
            actuator,
            estimator: OrientationEstimator::new(CalibrationOffset::default(), settings.mount),
            motion: MotionClassifier::new(settings.motion.gyro_threshold_dps),
            budget: SlouchBudget::new(settings.budget.window_ms),
            alert: AlertEscalation::new(
                settings.milestones.clone(),
                settings.posture.threshold_deg,
                settings.posture.hysteresis_deg,
            ),
            faults: FaultDetector::new(settings.fault.clone()),
            settings,
            clock,
            epoch,
            started: false,
            cycle: 0,
            last_cycle_ms: 0,
            last_event: None,
            recovery_started_ms: None,
            actuator_engaged: false,
            recalibrate_check,
            recalibrated: None,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.estimator.offset()
    }

    pub fn budget(&self) -> &SlouchBudget {
        &self.budget
    }

    pub fn alert_state(&self) -> &AlertState {
        self.alert.state()
    }

    pub fn milestones(&self) -> &MilestoneTable {
        self.alert.table()
    }

    /// Transition produced by the most recent cycle.
    pub fn last_event(&self) -> Option<AlertEvent> {
        self.last_event
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn fault_cycles(&self) -> u64 {
        self.faults.total()
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    /// Blocking calibration, then a fresh session.
    pub fn begin(&mut self) -> Result<CalibrationOffset> {
        let offset = self.measure_offset().wrap_err("startup calibration")?;
        self.begin_with_offset(offset);
        Ok(offset)
    }

    /// Fresh session with a known offset; no sensor reads.
    pub fn begin_with_offset(&mut self, offset: CalibrationOffset) {
        self.estimator.set_offset(offset);
        self.budget.clear();
        self.alert.reset();
        self.faults = FaultDetector::new(self.settings.fault.clone());
        self.epoch = self.clock.now();
        self.cycle = 0;
        self.last_cycle_ms = 0;
        self.last_event = None;
        self.recovery_started_ms = None;
        self.recalibrated = None;
        if let Err(e) = self.actuator.off() {
            tracing::warn!(error = %e, "actuator off failed at session start");
        }
        self.actuator_engaged = false;
        self.started = true;
        tracing::info!(
            mount = ?self.settings.mount,
            threshold_deg = self.settings.posture.threshold_deg,
            window_ms = self.settings.budget.window_ms,
            "monitoring started"
        );
    }

    /// Re-measure the neutral offset mid-session. Budget and alert state are
    /// kept; calibration time is not counted as a cycle delta.
    pub fn recalibrate(&mut self) -> Result<CalibrationOffset> {
        let offset = self.measure_offset().wrap_err("recalibration")?;
        self.estimator.set_offset(offset);
        self.last_cycle_ms = self.clock.ms_since(self.epoch);
        self.recalibrated = Some(offset);
        Ok(offset)
    }

    /// Offset from the most recent mid-session recalibration, once.
    pub fn take_recalibration(&mut self) -> Option<CalibrationOffset> {
        self.recalibrated.take()
    }

    /// Stop the actuator (best-effort at shutdown).
    pub fn silence(&mut self) -> Result<()> {
        self.actuator_engaged = false;
        self.actuator
            .off()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("silencing actuator")
    }

    /// One full cycle. Sensor and actuator failures are contained in the
    /// cycle; only calling before `begin()` is an error.
    pub fn step(&mut self) -> Result<Snapshot> {
        if !self.started {
            return Err(eyre::Report::new(PostureError::State(
                "step() called before begin()".into(),
            )));
        }
        self.poll_recalibrate();

        let now = self.clock.ms_since(self.epoch);
        let delta_ms = now.saturating_sub(self.last_cycle_ms);
        self.last_cycle_ms = now;
        self.cycle += 1;

        let timeout = Duration::from_millis(self.settings.timeouts.sensor_ms);
        let reading = match self.sensor.read(timeout) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::debug!(error = %map_hw_error(&*e), "sensor read failed");
                None
            }
        };

        let fault = self.faults.observe(reading.as_ref());
        let threshold = self.settings.posture.threshold_deg;
        let mut event = None;
        let mut sample = None;
        if let (None, Some(r)) = (fault, reading) {
            let orientation = self.estimator.estimate(r.accel_g, now);
            let motion = self.motion.classify(r.gyro_dps);
            let bad = in_bad_posture(orientation.pitch, threshold);
            self.budget.update(bad, motion.is_moving, delta_ms);
            event = self
                .alert
                .evaluate(&mut self.budget, orientation.pitch.abs(), bad, now);
            sample = Some((orientation, motion, bad));
        }
        if let Some(ev) = event {
            self.on_event(ev, now);
        }
        self.last_event = event;
        self.drive_actuator(now);

        Ok(emit(&SnapshotInput {
            cycle: self.cycle,
            timestamp_ms: now,
            delta_ms,
            orientation: sample.as_ref().map(|s| &s.0),
            motion: sample.as_ref().map(|s| &s.1),
            budget: &self.budget,
            alert: self.alert.state(),
            milestones: self.alert.table(),
            threshold_deg: threshold,
            in_bad_posture: sample.as_ref().is_some_and(|s| s.2),
            event: event.as_ref(),
            fault,
        }))
    }

    fn measure_offset(&mut self) -> Result<CalibrationOffset> {
        let timeout = Duration::from_millis(self.settings.timeouts.sensor_ms);
        calibrate(
            &mut self.sensor,
            &*self.clock,
            &self.settings.calibration,
            &self.settings.fault,
            timeout,
        )
    }

    fn poll_recalibrate(&mut self) {
        let requested = self.recalibrate_check.as_mut().is_some_and(|check| check());
        if !requested {
            return;
        }
        tracing::info!("recalibration requested");
        if let Err(e) = self.recalibrate() {
            tracing::warn!(error = %e, "recalibration failed; keeping previous offset");
        }
    }

    fn on_event(&mut self, event: AlertEvent, now_ms: u64) {
        let cumulative_ms = self.budget.cumulative_ms();
        match event {
            AlertEvent::Activated {
                level,
                milestone,
                reminder,
            } => {
                self.recovery_started_ms = None;
                tracing::info!(level = %level, milestone, reminder, cumulative_ms, "alert activated");
            }
            AlertEvent::Deactivated { level } => {
                tracing::info!(level = %level, cumulative_ms, "alert deactivated");
            }
            AlertEvent::Recovered { from_ms, to_ms } => {
                self.recovery_started_ms = Some(now_ms);
                tracing::info!(from_ms, to_ms, "recovered from critical; budget halved");
            }
            AlertEvent::Reset => {
                tracing::debug!(cumulative_ms, "alert escalation reset");
            }
        }
    }

    /// Active alert first, then a pending recovery chirp, else silence.
    fn current_cue(&mut self, now_ms: u64) -> Option<(Cue, u64)> {
        let state = self.alert.state();
        if state.active {
            return Some((
                Cue::Alert(state.level),
                now_ms.saturating_sub(state.activated_at_ms),
            ));
        }
        let started = self.recovery_started_ms?;
        let elapsed = now_ms.saturating_sub(started);
        let finished = Pattern::for_cue(Cue::Recovery)
            .is_none_or(|p| p.phase_at(elapsed) == PhaseAt::Finished);
        if finished {
            self.recovery_started_ms = None;
            return None;
        }
        Some((Cue::Recovery, elapsed))
    }

    fn drive_actuator(&mut self, now_ms: u64) {
        match self.current_cue(now_ms) {
            Some((cue, elapsed)) => {
                if let Err(e) = self.actuator.render(cue, elapsed) {
                    tracing::warn!(error = %map_hw_error(&*e), ?cue, "actuator render failed");
                }
                self.actuator_engaged = true;
            }
            None if self.actuator_engaged => {
                if let Err(e) = self.actuator.off() {
                    tracing::warn!(error = %map_hw_error(&*e), "actuator off failed");
                }
                self.actuator_engaged = false;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ActuatorCall, FnSensor, RecordingActuator, still_reading};
    use posture_traits::ManualClock;

    fn monitor(
        pitch: f32,
        clock: &ManualClock,
    ) -> (
        MonitorCore<FnSensor, RecordingActuator>,
        RecordingActuator,
    ) {
        let actuator = RecordingActuator::default();
        let mut settings = MonitorSettings::default();
        settings.fault.stuck_cycles = 0;
        let m = MonitorCore::new(
            FnSensor::new(move |_| Ok(still_reading(pitch, 0.0))),
            actuator.clone(),
            settings,
            Arc::new(clock.clone()),
            None,
        );
        (m, actuator)
    }

    #[test]
    fn step_before_begin_is_rejected() {
        let clock = ManualClock::new();
        let (mut m, _) = monitor(0.0, &clock);
        let err = m.step().unwrap_err();
        assert!(err.to_string().contains("before begin"));
    }

    #[test]
    fn delta_is_measured_on_the_clock() {
        let clock = ManualClock::new();
        let (mut m, _) = monitor(20.0, &clock);
        m.begin_with_offset(CalibrationOffset::default());
        clock.advance_ms(100);
        assert_eq!(m.step().unwrap().delta_ms, 100);
        clock.advance_ms(350);
        let s = m.step().unwrap();
        assert_eq!(s.delta_ms, 350);
        assert_eq!(s.cumulative_slouch_ms, 450);
        assert_eq!(s.timestamp, 450);
    }

    #[test]
    fn begin_calibrates_from_sensor() {
        let clock = ManualClock::new();
        let (mut m, _) = monitor(7.0, &clock);
        let off = m.begin().unwrap();
        assert!((off.pitch_offset_deg - 7.0).abs() < 1e-3);
        clock.advance_ms(100);
        let s = m.step().unwrap();
        assert!(s.pitch.unwrap().abs() < 1e-3);
    }

    #[test]
    fn actuator_follows_alert_and_turns_off_once() {
        let clock = ManualClock::new();
        let (mut m, actuator) = monitor(20.0, &clock);
        m.begin_with_offset(CalibrationOffset::default());
        assert_eq!(actuator.calls(), vec![ActuatorCall::Off]);
        actuator.clear();
        for _ in 0..50 {
            clock.advance_ms(100);
            m.step().unwrap();
        }
        assert!(m.alert_state().active);
        let calls = actuator.calls();
        assert_eq!(
            calls.first(),
            Some(&ActuatorCall::Render(
                Cue::Alert(crate::alert::AlertLevel::Gentle),
                0
            ))
        );

        // Correct posture: alert relaxes below threshold - hysteresis.
        m.estimator.set_offset(CalibrationOffset {
            pitch_offset_deg: 20.0,
            roll_offset_deg: 0.0,
        });
        actuator.clear();
        for _ in 0..3 {
            clock.advance_ms(100);
            m.step().unwrap();
        }
        assert_eq!(actuator.calls(), vec![ActuatorCall::Off]);
    }

    #[test]
    fn recalibration_check_is_polled_each_cycle() {
        let clock = ManualClock::new();
        let actuator = RecordingActuator::default();
        let mut fired = false;
        let mut m = MonitorCore::new(
            FnSensor::new(|_| Ok(still_reading(12.0, 0.0))),
            actuator,
            MonitorSettings::default(),
            Arc::new(clock.clone()),
            Some(Box::new(move || !std::mem::replace(&mut fired, true))),
        );
        m.begin_with_offset(CalibrationOffset::default());
        clock.advance_ms(100);
        let s = m.step().unwrap();
        assert!((m.offset().pitch_offset_deg - 12.0).abs() < 1e-3);
        assert!(s.pitch.unwrap().abs() < 1e-3);
        assert!(m.take_recalibration().is_some());
        assert!(m.take_recalibration().is_none());
    }
}
