//! Single-sample tilt estimation from the gravity vector.
//!
//! Axis convention: x forward, y lateral, z vertical. Pitch is the angle
//! between the forward and vertical components, roll between lateral and
//! vertical, both from the two-argument arctangent so an edge-on sensor
//! (z near 0) reads ±90° instead of dividing by zero.

use serde::Serialize;

use crate::calibration::CalibrationOffset;
use crate::config::Mount;

/// Calibrated head orientation for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientationSample {
    /// Degrees from neutral; positive is forward.
    pub pitch: f32,
    pub roll: f32,
    /// Angles before offset and mount inversion.
    pub pitch_raw: f32,
    pub roll_raw: f32,
    pub timestamp_ms: u64,
}

/// Raw (uncalibrated) pitch and roll in degrees.
#[inline]
pub fn raw_angles(accel_g: [f32; 3]) -> (f32, f32) {
    let [x, y, z] = accel_g;
    (x.atan2(z).to_degrees(), y.atan2(z).to_degrees())
}

/// `raw_angles` maps this back to `(pitch_deg, roll_deg)`.
pub use posture_traits::tilt_to_accel;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationEstimator {
    offset: CalibrationOffset,
    mount: Mount,
}

impl OrientationEstimator {
    pub fn new(offset: CalibrationOffset, mount: Mount) -> Self {
        Self { offset, mount }
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    pub fn set_offset(&mut self, offset: CalibrationOffset) {
        self.offset = offset;
    }

    pub fn mount(&self) -> Mount {
        self.mount
    }

    pub fn estimate(&self, accel_g: [f32; 3], timestamp_ms: u64) -> OrientationSample {
        let (pitch_raw, roll_raw) = raw_angles(accel_g);
        // Offsets were measured in the raw frame, so subtract before inverting.
        let mut pitch = pitch_raw - self.offset.pitch_offset_deg;
        let mut roll = roll_raw - self.offset.roll_offset_deg;
        if self.mount.inverted() {
            pitch = -pitch;
            roll = -roll;
        }
        OrientationSample {
            pitch,
            roll,
            pitch_raw,
            roll_raw,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(20.0, 0.0)]
    #[case(-20.0, 5.0)]
    #[case(45.0, -30.0)]
    #[case(80.0, 10.0)]
    fn tilt_vector_maps_back_to_angles(#[case] pitch: f32, #[case] roll: f32) {
        let (p, r) = raw_angles(tilt_to_accel(pitch, roll));
        assert!(close(p, pitch), "pitch {p} != {pitch}");
        assert!(close(r, roll), "roll {r} != {roll}");
    }

    #[test]
    fn edge_on_sensor_reads_ninety_degrees() {
        let (p, r) = raw_angles([1.0, 0.0, 0.0]);
        assert!(close(p, 90.0));
        assert!(close(r, 0.0));
        let (p, _) = raw_angles([-1.0, 0.0, 0.0]);
        assert!(close(p, -90.0));
        let (p, r) = raw_angles([0.0, 0.0, 0.0]);
        assert!(p.is_finite() && r.is_finite());
    }

    #[test]
    fn offset_is_subtracted() {
        let est = OrientationEstimator::new(
            CalibrationOffset {
                pitch_offset_deg: 10.0,
                roll_offset_deg: -5.0,
            },
            Mount::Neck,
        );
        let s = est.estimate(tilt_to_accel(25.0, 0.0), 42);
        assert!(close(s.pitch, 15.0));
        assert!(close(s.roll, 5.0));
        assert!(close(s.pitch_raw, 25.0));
        assert_eq!(s.timestamp_ms, 42);
    }

    #[test]
    fn hat_mount_negates_after_offset() {
        let offset = CalibrationOffset {
            pitch_offset_deg: 10.0,
            roll_offset_deg: 4.0,
        };
        let est = OrientationEstimator::new(offset, Mount::Hat);
        let s = est.estimate(tilt_to_accel(30.0, 6.0), 0);
        // (30 - 10) negated, not -30 - 10.
        assert!(close(s.pitch, -20.0), "pitch {}", s.pitch);
        assert!(close(s.roll, -2.0), "roll {}", s.roll);
    }
}
