//! Faulted cycles must never move the budget or the alert state.

use posture_core::mocks::{FnSensor, NullActuator, still_reading};
use posture_core::{CalibrationOffset, FaultKind, MonitorSettings, build_monitor};
use posture_traits::{ImuReading, ManualClock};
use rstest::rstest;

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

fn faulty(reading: Result<ImuReading, &'static str>) -> Result<ImuReading, BoxErr> {
    reading.map_err(Into::into)
}

#[rstest]
#[case::read_error(Err("i2c timeout"), FaultKind::SensorUnavailable)]
#[case::nan(Ok(ImuReading::new([f32::NAN, 0.0, 1.0], [0.0; 3])), FaultKind::NumericDegenerate)]
#[case::inf_gyro(Ok(ImuReading::new([0.0, 0.0, 1.0], [f32::INFINITY, 0.0, 0.0])), FaultKind::NumericDegenerate)]
#[case::saturated(Ok(ImuReading::new([0.0, 0.0, 40.0], [0.0; 3])), FaultKind::OutOfRange)]
#[case::zero_accel(Ok(ImuReading::new([0.0; 3], [0.0; 3])), FaultKind::OutOfRange)]
#[case::weak_accel(Ok(ImuReading::new([0.05, 0.0, 0.1], [1.0, 0.0, 0.0])), FaultKind::OutOfRange)]
fn faulted_cycles_freeze_budget(
    #[case] bad: Result<ImuReading, &'static str>,
    #[case] expect: FaultKind,
) {
    let clock = ManualClock::new();
    let mut settings = MonitorSettings::default();
    settings.fault.stuck_cycles = 0;
    // 100 slouched cycles, then 50 faulted ones, then slouched again.
    let mut m = build_monitor(
        FnSensor::new(move |i| {
            if (100..150).contains(&i) {
                faulty(bad)
            } else {
                Ok(still_reading(20.0, 0.0))
            }
        }),
        NullActuator,
        settings,
        Some(Box::new(clock.clone())),
    )
    .unwrap();
    m.begin_with_offset(CalibrationOffset::default());

    let mut snaps = Vec::new();
    for _ in 0..160 {
        clock.advance_ms(100);
        snaps.push(m.step().unwrap());
    }
    let frozen = snaps[99].cumulative_slouch_ms;
    assert_eq!(frozen, 10_000);
    for s in &snaps[100..150] {
        assert_eq!(s.fault, Some(expect));
        assert_eq!(s.cumulative_slouch_ms, frozen);
        assert!(s.pitch.is_none() && s.roll.is_none());
        assert_eq!(s.alert_level_name, "gentle");
    }
    // Accumulation resumes with the measured delta only (no catch-up).
    assert_eq!(snaps[150].fault, None);
    assert_eq!(snaps[150].cumulative_slouch_ms, 10_100);
    assert_eq!(m.fault_cycles(), 50);
}

#[test]
fn stuck_sensor_is_flagged_after_limit() {
    let clock = ManualClock::new();
    let mut settings = MonitorSettings::default();
    settings.fault.stuck_cycles = 10;
    let mut m = build_monitor(
        FnSensor::new(|_| Ok(still_reading(20.0, 0.0))),
        NullActuator,
        settings,
        Some(Box::new(clock.clone())),
    )
    .unwrap();
    m.begin_with_offset(CalibrationOffset::default());
    let mut snaps = Vec::new();
    for _ in 0..20 {
        clock.advance_ms(100);
        snaps.push(m.step().unwrap());
    }
    assert!(snaps[..9].iter().all(|s| s.fault.is_none()));
    assert!(snaps[9..].iter().all(|s| s.fault == Some(FaultKind::Stuck)));
    // Only the 9 clean cycles counted.
    assert_eq!(snaps[19].cumulative_slouch_ms, 900);
}

#[test]
fn varying_sensor_is_never_stuck() {
    let clock = ManualClock::new();
    let mut m = build_monitor(
        FnSensor::new(|i| Ok(still_reading((i % 7) as f32, 0.0))),
        NullActuator,
        MonitorSettings::default(),
        Some(Box::new(clock.clone())),
    )
    .unwrap();
    m.begin_with_offset(CalibrationOffset::default());
    for _ in 0..500 {
        clock.advance_ms(100);
        assert!(m.step().unwrap().fault.is_none());
    }
}
