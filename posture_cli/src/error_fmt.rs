//! Human-readable error descriptions and structured JSON error formatting.

use posture_core::error::{BuildError, PostureError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No sensor was provided to the monitor.\nLikely causes: The IMU failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No buzzer was provided to the monitor.\nLikely causes: The buzzer pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the buzzer is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/posture_config.toml for a sample."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PostureError>() {
        return match pe {
            PostureError::Timeout => "What happened: Sensor read timed out.\nLikely causes: IMU not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify SDA/SCL wiring and power, and consider increasing sensor.read_timeout_ms in the config.".to_string(),
            PostureError::Calibration(msg) => format!(
                "What happened: Calibration failed ({msg}).\nLikely causes: The sensor returned no usable samples while measuring the neutral posture.\nHow to fix: Check the sensor connection, hold still in a neutral posture, and run `posture calibrate` again."
            ),
            PostureError::Hardware(msg) | PostureError::HardwareFault(msg) => format!(
                "What happened: Sensor or buzzer error ({msg}).\nLikely causes: Loose I2C wiring, wrong [sensor] i2c_bus/i2c_address, or insufficient GPIO permissions.\nHow to fix: Run `posture self-check` and fix the wiring or config before monitoring."
            ),
            PostureError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A value in the TOML is missing, mistyped or out of range.\nHow to fix: Edit the TOML config and try again."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("replay csv must have headers") {
        return "Invalid headers in replay CSV. Expected 'ax,ay,az,gx,gy,gz'.".to_string();
    }

    if lower.contains("open csv log") {
        return format!(
            "What happened: Cannot open the CSV log ({}).\nLikely causes: The directory does not exist or is not writable.\nHow to fix: Create the directory or pass a different --csv path.",
            root_message(err)
        );
    }

    if lower.contains("open mpu6050") || lower.contains("open buzzer pin") {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect bus/pin numbers, I2C disabled, or insufficient permissions.\nHow to fix: Fix [sensor] and [buzzer] in the config; enable I2C and make sure the process may access /dev/i2c-* and GPIO.".to_string();
    }

    if lower.contains("must be") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid ({}).\nLikely causes: A value in the TOML is missing or out of range.\nHow to fix: Edit the TOML config and try again.",
            root_message(err)
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn root_message(err: &eyre::Report) -> String {
    err.chain()
        .last()
        .map_or_else(|| err.to_string(), ToString::to_string)
}

/// Stable reason name for JSON output and exit codes.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<PostureError>() {
        Some(PostureError::Calibration(_)) => "Calibration",
        Some(PostureError::Timeout) => "SensorTimeout",
        Some(PostureError::Hardware(_) | PostureError::HardwareFault(_)) => "Hardware",
        Some(PostureError::Config(_)) => "Config",
        _ => "Error",
    }
}

/// Exit codes: 1 generic, 2 usage (clap), 3 config, 4 calibration, 5 hardware.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    match reason_name(err) {
        "Config" => 3,
        "Calibration" => 4,
        "SensorTimeout" | "Hardware" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "error": {
            "reason": reason_name(err),
            "exit_code": exit_code_for_error(err),
            "message": humanize(err),
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_failure_is_explained() {
        let err = eyre::Report::new(PostureError::Calibration("no valid samples out of 5".into()))
            .wrap_err("startup calibration");
        let text = humanize(&err);
        assert!(text.starts_with("What happened: Calibration failed"));
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn config_errors_are_classified() {
        let err = eyre::Report::new(PostureError::Config(
            "posture.threshold_deg must be in (0.0, 90.0)".into(),
        ));
        assert!(humanize(&err).contains("threshold_deg"));
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn untyped_config_text_still_gets_hints() {
        let err = eyre::eyre!("runner.period_ms must be >= 1");
        let text = humanize(&err);
        assert!(text.contains("Configuration is invalid (runner.period_ms must be >= 1)"));
        assert_eq!(exit_code_for_error(&err), 1);
    }

    #[test]
    fn json_error_has_reason() {
        let err = eyre::Report::new(BuildError::InvalidConfig("threshold_deg"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["error"]["reason"], "Config");
        assert_eq!(v["error"]["exit_code"], 3);
    }
}
