//! Static-vs-moving gate from gyro magnitude. Hard threshold, no hysteresis.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionState {
    pub is_moving: bool,
    pub gyro_magnitude_dps: f32,
    pub gyro_dps: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct MotionClassifier {
    threshold_dps: f32,
}

impl MotionClassifier {
    pub fn new(threshold_dps: f32) -> Self {
        Self { threshold_dps }
    }

    pub fn threshold_dps(&self) -> f32 {
        self.threshold_dps
    }

    pub fn classify(&self, gyro_dps: [f32; 3]) -> MotionState {
        let [x, y, z] = gyro_dps;
        let magnitude = (x * x + y * y + z * z).sqrt();
        MotionState {
            is_moving: magnitude > self.threshold_dps,
            gyro_magnitude_dps: magnitude,
            gyro_dps,
        }
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0.0, 0.0, 0.0], false)]
    #[case([20.0, 0.0, 0.0], false)]
    #[case([12.0, 16.0, 0.0], false)] // exactly 20 is not moving
    #[case([12.0, 16.0, 0.5], true)]
    #[case([0.0, -25.0, 0.0], true)]
    fn threshold_is_strict(#[case] gyro: [f32; 3], #[case] moving: bool) {
        let m = MotionClassifier::new(20.0).classify(gyro);
        assert_eq!(m.is_moving, moving, "gyro {gyro:?} -> {}", m.gyro_magnitude_dps);
    }

    #[test]
    fn magnitude_is_euclidean() {
        let m = MotionClassifier::default().classify([3.0, 4.0, 12.0]);
        assert!((m.gyro_magnitude_dps - 13.0).abs() < 1e-5);
        assert_eq!(m.gyro_dps, [3.0, 4.0, 12.0]);
    }
}
