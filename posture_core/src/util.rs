//! Common time/period helpers for posture_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Time left in a cycle of `period_ms` after `spent_ms` of work. Zero when
/// the cycle overran.
#[inline]
pub fn remaining_ms(period_ms: u64, spent_ms: u64) -> u64 {
    period_ms.saturating_sub(spent_ms)
}

/// Whole seconds in `ms`, truncated.
#[inline]
pub fn whole_secs(ms: u64) -> u64 {
    ms / MILLIS_PER_SEC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_saturates_on_overrun() {
        assert_eq!(remaining_ms(100, 30), 70);
        assert_eq!(remaining_ms(100, 100), 0);
        assert_eq!(remaining_ms(100, 250), 0);
    }

    #[test]
    fn whole_secs_truncates() {
        assert_eq!(whole_secs(5_999), 5);
        assert_eq!(whole_secs(6_000), 6);
    }
}
