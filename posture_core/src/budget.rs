//! Bounded slouch-duration accumulator.
//!
//! Grows while the wearer is slouched and still, decays otherwise. Moving
//! while nominally slouched decays too: reaching or adjusting should not be
//! scored as sustained slouching.

use serde::Serialize;

/// `|pitch| > threshold`, symmetric for forward and backward tilt.
#[inline]
pub fn in_bad_posture(pitch_deg: f32, threshold_deg: f32) -> bool {
    pitch_deg.abs() > threshold_deg
}

/// Invariant: `0 <= cumulative_ms <= window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlouchBudget {
    cumulative_ms: u64,
    window_ms: u64,
}

impl SlouchBudget {
    pub fn new(window_ms: u64) -> Self {
        Self {
            cumulative_ms: 0,
            window_ms,
        }
    }

    /// Budget pre-loaded with `cumulative_ms` (clamped to the window).
    pub fn with_cumulative(window_ms: u64, cumulative_ms: u64) -> Self {
        Self {
            cumulative_ms: cumulative_ms.min(window_ms),
            window_ms,
        }
    }

    #[inline]
    pub fn cumulative_ms(&self) -> u64 {
        self.cumulative_ms
    }

    #[inline]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Whole seconds, truncated.
    #[inline]
    pub fn cumulative_s(&self) -> u64 {
        self.cumulative_ms / crate::util::MILLIS_PER_SEC
    }

    /// Integrate one cycle and return the new value.
    pub fn update(&mut self, in_bad_posture: bool, is_moving: bool, delta_ms: u64) -> u64 {
        self.cumulative_ms = if in_bad_posture && !is_moving {
            self.cumulative_ms
                .saturating_add(delta_ms)
                .min(self.window_ms)
        } else {
            self.cumulative_ms.saturating_sub(delta_ms)
        };
        self.cumulative_ms
    }

    /// Recovery reward: halve (rounding down) and return the new value.
    pub fn halve(&mut self) -> u64 {
        self.cumulative_ms /= 2;
        self.cumulative_ms
    }

    pub fn clear(&mut self) {
        self.cumulative_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, false, 100, 100)]
    #[case(false, false, 100, 0)]
    #[case(true, true, 100, 0)]
    #[case(false, true, 100, 0)]
    fn update_rules_from_zero(
        #[case] bad: bool,
        #[case] moving: bool,
        #[case] delta: u64,
        #[case] expect: u64,
    ) {
        let mut b = SlouchBudget::new(900_000);
        assert_eq!(b.update(bad, moving, delta), expect);
    }

    #[test]
    fn moving_while_slouched_decays() {
        let mut b = SlouchBudget::with_cumulative(900_000, 10_000);
        b.update(true, true, 2_500);
        assert_eq!(b.cumulative_ms(), 7_500);
    }

    #[test]
    fn clamps_at_window() {
        let mut b = SlouchBudget::with_cumulative(1_000, 950);
        assert_eq!(b.update(true, false, 100), 1_000);
        assert_eq!(b.update(true, false, u64::MAX), 1_000);
    }

    #[test]
    fn never_negative() {
        let mut b = SlouchBudget::with_cumulative(1_000, 50);
        assert_eq!(b.update(false, false, 100), 0);
        assert_eq!(b.update(false, false, u64::MAX), 0);
    }

    #[test]
    fn halve_rounds_down() {
        let mut b = SlouchBudget::with_cumulative(900_000, 300_001);
        assert_eq!(b.halve(), 150_000);
    }

    #[test]
    fn bad_posture_is_symmetric_and_strict() {
        assert!(in_bad_posture(15.1, 15.0));
        assert!(in_bad_posture(-15.1, 15.0));
        assert!(!in_bad_posture(15.0, 15.0));
        assert!(!in_bad_posture(-15.0, 15.0));
        assert!(!in_bad_posture(0.0, 15.0));
    }
}
