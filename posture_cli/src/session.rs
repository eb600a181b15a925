//! Backend assembly, the monitor session and its telemetry writer.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use eyre::{Result, WrapErr};
use posture_config::Config;
use posture_core::hw_error::map_hw_error;
use posture_core::telemetry::channel;
use posture_core::{
    BuzzerActuator, CalibrationOffset, Monitor, MonitorSettings, Mount, RunParams, RunSummary,
    Snapshot, StatusRecord, TelemetryReceiver, TelemetryRecord,
};
use posture_traits::{Buzzer, ImuReading, ImuSensor};

use crate::cli::MountArg;
use crate::csv_log::CsvLog;

pub struct MonitorOpts {
    pub cycles: Option<u64>,
    pub replay: Option<PathBuf>,
    pub mount: Option<MountArg>,
    pub recalibrate_file: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub json: bool,
}

pub fn backend_name() -> &'static str {
    if cfg!(feature = "hardware") {
        "hardware"
    } else {
        "sim"
    }
}

/// Live sensor for the selected backend.
pub fn make_sensor(cfg: &Config) -> Result<Box<dyn ImuSensor>> {
    #[cfg(feature = "hardware")]
    {
        let imu = posture_hardware::mpu6050::Mpu6050::new(
            cfg.sensor.i2c_bus,
            cfg.sensor.i2c_address,
        )
        .wrap_err("open mpu6050")?;
        return Ok(Box::new(imu));
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = cfg;
        let imu = posture_hardware::SimulatedImu::from_env().wrap_err("simulated sensor")?;
        Ok(Box::new(imu))
    }
}

pub fn make_buzzer(cfg: &Config) -> Result<Box<dyn Buzzer>> {
    #[cfg(feature = "hardware")]
    {
        let bz = posture_hardware::gpio_buzzer::GpioBuzzer::new(cfg.buzzer.pin)
            .wrap_err("open buzzer pin")?;
        return Ok(Box::new(bz));
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = cfg;
        Ok(Box::new(posture_hardware::SimulatedBuzzer::new()))
    }
}

fn replay_sensor(path: &Path) -> Result<(posture_hardware::ReplayImu, usize)> {
    let rows = posture_config::load_replay_csv(path)?;
    let readings: Vec<ImuReading> = rows
        .iter()
        .map(|r| ImuReading::new([r.ax, r.ay, r.az], [r.gx, r.gy, r.gz]))
        .collect();
    let n = readings.len();
    Ok((posture_hardware::ReplayImu::new(readings), n))
}

pub fn settings_for(cfg: &Config, mount: Option<MountArg>) -> Result<MonitorSettings> {
    let mut settings = MonitorSettings::try_from(cfg)?;
    if let Some(m) = mount {
        settings.mount = Mount::from(m);
    }
    Ok(settings)
}

/// Returns true once per appearance of `path`, deleting it.
fn recalibrate_trigger(path: PathBuf) -> impl FnMut() -> bool + 'static {
    move || {
        if !path.exists() {
            return false;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "recalibration requested");
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot remove recalibration trigger; ignoring it");
                false
            }
        }
    }
}

pub fn run_monitor(cfg: &Config, opts: MonitorOpts, shutdown: Arc<AtomicBool>) -> Result<RunSummary> {
    let settings = settings_for(cfg, opts.mount)?;

    // A replay without --cycles stops when the recording runs out.
    let (sensor, cycles): (Box<dyn ImuSensor>, Option<u64>) = match &opts.replay {
        Some(path) => {
            let (imu, rows) = replay_sensor(path)?;
            // Calibration consumes the first rows of the recording.
            let left = rows.saturating_sub(settings.calibration.samples) as u64;
            tracing::info!(path = %path.display(), rows, "replaying recorded session");
            let sensor: Box<dyn ImuSensor> = Box::new(imu);
            (sensor, opts.cycles.or(Some(left)))
        }
        None => (make_sensor(cfg)?, opts.cycles),
    };
    let actuator = BuzzerActuator::new(make_buzzer(cfg)?);

    let mut builder = Monitor::builder()
        .with_settings(settings)
        .with_sensor(sensor)
        .with_actuator(actuator);
    if let Some(path) = opts.recalibrate_file {
        builder = builder.with_recalibrate_check(recalibrate_trigger(path));
    }
    let mut monitor = builder.build()?;
    let csv = opts.csv.as_deref().map(CsvLog::open).transpose()?;

    let (mut sink, rx) = channel(cfg.runner.telemetry_buffer);
    let writer = spawn_writer(rx, opts.json, csv)?;

    let params = RunParams {
        period_ms: cfg.runner.period_ms,
        max_cycles: cycles,
    };
    let result = monitor.run(&mut sink, &params, &shutdown);

    let dropped = sink.dropped();
    drop(sink);
    let written = writer.join().unwrap_or_else(|_| {
        tracing::error!("telemetry writer panicked");
        0
    });
    if dropped > 0 {
        tracing::warn!(dropped, written, "telemetry writer fell behind; snapshots dropped");
    }
    result
}

/// One-off calibration; the monitor is built only to reuse its validation.
pub fn run_calibrate(cfg: &Config) -> Result<CalibrationOffset> {
    let mut monitor = Monitor::builder()
        .with_settings(settings_for(cfg, None)?)
        .with_sensor(make_sensor(cfg)?)
        .with_actuator(BuzzerActuator::new(make_buzzer(cfg)?))
        .build()?;
    let offset = monitor.begin()?;
    if let Err(e) = monitor.silence() {
        tracing::warn!(error = %e, "failed to silence buzzer");
    }
    Ok(offset)
}

/// Read one sample and blip the buzzer.
pub fn self_check(cfg: &Config) -> Result<ImuReading> {
    let settings = settings_for(cfg, None)?;
    let mut sensor = make_sensor(cfg)?;
    let timeout = std::time::Duration::from_millis(settings.timeouts.sensor_ms);
    let reading = sensor
        .read(timeout)
        .map_err(|e| map_hw_error(&*e))
        .wrap_err("sensor read")?;
    if let Some(kind) = posture_core::fault::reading_fault(&reading, &settings.fault) {
        eyre::bail!(posture_core::PostureError::HardwareFault(format!(
            "sensor returned an unusable sample ({kind})"
        )));
    }
    let mut buzzer = make_buzzer(cfg)?;
    buzzer
        .tone(2000)
        .and_then(|()| buzzer.silence())
        .map_err(|e| map_hw_error(&*e))
        .wrap_err("buzzer")?;
    Ok(reading)
}

fn spawn_writer(
    rx: TelemetryReceiver,
    json: bool,
    mut csv: Option<CsvLog>,
) -> Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("telemetry".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let mut written = 0u64;
            for record in rx.iter() {
                if let TelemetryRecord::Snapshot(s) = &record
                    && let Some(log) = csv.as_mut()
                    && let Err(e) = log.append(s)
                {
                    tracing::warn!(path = %log.path().display(), error = %format!("{e:#}"), "CSV log disabled");
                    csv = None;
                }
                let line = if json {
                    match serde_json::to_string(&record) {
                        Ok(l) => l,
                        Err(e) => {
                            tracing::warn!(error = %e, "telemetry encode failed");
                            continue;
                        }
                    }
                } else {
                    match human_line(&record) {
                        Some(l) => l,
                        None => continue,
                    }
                };
                if let Err(e) = writeln!(out, "{line}") {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::warn!(error = %e, "telemetry write failed");
                    }
                    break;
                }
                written += 1;
            }
            let _ = out.flush();
            written
        })
        .wrap_err("spawn telemetry writer")
}

/// 20-cell bar of |pitch| with a verdict relative to `threshold`.
fn posture_bar(pitch: f32, threshold: f32) -> String {
    let dev = pitch.abs();
    let filled = dev.clamp(0.0, 20.0) as usize;
    let verdict = if dev < threshold - 2.0 {
        "GOOD"
    } else if dev < threshold {
        "OK"
    } else if dev < threshold + 10.0 {
        "SLOUCH"
    } else {
        "BAD"
    };
    format!("{}{} {verdict:<6}", "#".repeat(filled), ".".repeat(20 - filled))
}

fn status_line(s: &Snapshot) -> String {
    let secs = s.timestamp as f64 / 1000.0;
    let slouch = format!("{}:{:02}", s.cumulative_slouch_s / 60, s.cumulative_slouch_s % 60);
    match (s.fault, s.pitch, s.roll) {
        (None, Some(pitch), Some(roll)) => format!(
            "[{secs:>8.1}s] pitch={pitch:+6.1}° roll={roll:+6.1}° {:<6} slouch={slouch:>6} {} level={}",
            if s.is_moving { "moving" } else { "still" },
            posture_bar(pitch, s.threshold),
            s.alert_level_name
        ),
        (fault, _, _) => format!(
            "[{secs:>8.1}s] fault={} slouch={slouch:>6} level={}",
            fault.map_or("unknown", |f| f.name()),
            s.alert_level_name
        ),
    }
}

/// Console rendering: lifecycle records, one status line per cycle, and an
/// extra line for each alert event.
fn human_line(record: &TelemetryRecord) -> Option<String> {
    match record {
        TelemetryRecord::Status(s) => Some(match s {
            StatusRecord::Initialized { version } => format!("posture monitor {version}"),
            StatusRecord::Calibrating { samples } => {
                format!("Calibrating: hold a neutral posture ({samples} samples)")
            }
            StatusRecord::Calibrated {
                pitch_offset,
                roll_offset,
            } => format!("Calibrated: pitch offset {pitch_offset:.1}°, roll offset {roll_offset:.1}°"),
            StatusRecord::Fault { message } => format!("Fault: {message}"),
        }),
        TelemetryRecord::Snapshot(s) => {
            let status = status_line(s);
            let Some(event) = s.alert_event else {
                return Some(status);
            };
            let secs = s.timestamp as f64 / 1000.0;
            let pitch = s
                .pitch
                .map_or_else(|| "n/a".to_string(), |p| format!("{p:+.1}°"));
            Some(format!(
                "{status}\n[{secs:>8.1}s] {event:<11} level={} slouch={}s pitch={pitch}",
                s.alert_level_name, s.cumulative_slouch_s
            ))
        }
    }
}

pub fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        let v = serde_json::json!({
            "summary": {
                "cycles": summary.cycles,
                "fault_cycles": summary.fault_cycles,
                "activations": summary.activations,
                "recoveries": summary.recoveries,
                "overruns": summary.overruns,
                "final_level": summary.final_level.name(),
                "final_budget_ms": summary.final_budget_ms,
            }
        });
        println!("{v}");
    } else {
        println!(
            "Monitor finished: {} cycles, {} alerts, {} recoveries, {} faulted cycles, final level {} ({} ms slouch budget)",
            summary.cycles,
            summary.activations,
            summary.recoveries,
            summary.fault_cycles,
            summary.final_level,
            summary.final_budget_ms
        );
    }
}
