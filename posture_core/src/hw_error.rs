//! Maps `Box<dyn Error>` from trait boundaries to typed `PostureError`.
//!
//! The traits in `posture_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `posture_hardware::HwError`.

use crate::error::PostureError;

/// Map a trait-boundary error to a typed `PostureError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PostureError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<posture_hardware::error::HwError>() {
            return match hw {
                posture_hardware::error::HwError::Timeout => PostureError::Timeout,
                other => PostureError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        PostureError::Timeout
    } else {
        PostureError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_text_maps_to_timeout() {
        let e = std::io::Error::other("I2C read timeout");
        assert!(matches!(map_hw_error(&e), PostureError::Timeout));
    }

    #[test]
    fn other_text_maps_to_hardware() {
        let e = std::io::Error::other("bus glitch");
        match map_hw_error(&e) {
            PostureError::Hardware(msg) => assert!(msg.contains("bus glitch")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        use posture_hardware::error::HwError;
        assert!(matches!(map_hw_error(&HwError::Timeout), PostureError::Timeout));
        assert!(matches!(
            map_hw_error(&HwError::Disconnected),
            PostureError::HardwareFault(_)
        ));
    }
}
