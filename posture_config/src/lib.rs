#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and session-replay parsing for the posture monitor.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; an empty file yields the reference defaults.
//! - Replay CSV loader enforces headers so recorded sessions can drive the
//!   monitor without hardware.
use serde::Deserialize;
use serde::de::Deserializer;

/// Replay CSV schema.
///
/// Expected headers:
/// ax,ay,az,gx,gy,gz
///
/// Example:
/// ax,ay,az,gx,gy,gz
/// 0.0,0.0,1.0,0.1,-0.2,0.0
/// 0.26,0.0,0.97,0.3,0.1,-0.1
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ReplayRow {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

/// Which way the sensor is mounted. `Hat` mounts it upside down relative to
/// the neck clip, so calibrated angles are negated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    #[default]
    Neck,
    Hat,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    pub mount: Mount,
    /// Max time to wait for a sample before the cycle reports a sensor fault
    pub read_timeout_ms: u64,
    /// I2C bus number (hardware backend only)
    pub i2c_bus: u8,
    /// 7-bit I2C address of the IMU (0x68 or 0x69 for MPU-6050)
    pub i2c_address: u16,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            mount: Mount::Neck,
            read_timeout_ms: 50,
            i2c_bus: 1,
            i2c_address: 0x68,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub samples: usize,
    pub interval_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 50,
            interval_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PostureCfg {
    /// |pitch| above this (degrees from neutral) counts as slouching
    pub threshold_deg: f32,
    /// Alert relaxes once |pitch| drops below threshold - hysteresis
    pub hysteresis_deg: f32,
}

impl Default for PostureCfg {
    fn default() -> Self {
        Self {
            threshold_deg: 15.0,
            hysteresis_deg: 2.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotionCfg {
    pub gyro_threshold_dps: f32,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            gyro_threshold_dps: 20.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BudgetCfg {
    /// Upper bound of the slouch budget (rolling window), ms
    pub window_ms: u64,
}

impl Default for BudgetCfg {
    fn default() -> Self {
        Self { window_ms: 900_000 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LevelName {
    Gentle,
    Warning,
    Urgent,
    Critical,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertProfile {
    /// 5s/30s/60s/2-4min reminders/5min
    #[default]
    Progressive,
    /// Compressed schedule for bench testing; never the default
    Testing,
    /// Use `alerts.milestones` verbatim
    Custom,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AlertsCfg {
    pub profile: AlertProfile,
    /// Custom milestone table. Accepts either:
    /// - array of tuples: [[5000, "gentle"], [30000, "warning"], ...]
    /// - array of tables: [{ at_ms = 5000, level = "gentle" }, ...]
    #[serde(deserialize_with = "de_milestones")]
    pub milestones: Vec<(u64, LevelName)>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Cycle period in ms (100 = 10 Hz)
    pub period_ms: u64,
    /// Snapshots buffered for the telemetry writer before new ones are dropped
    pub telemetry_buffer: usize,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            period_ms: 100,
            telemetry_buffer: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FaultCfg {
    /// Consecutive bit-identical readings before the sensor is considered stuck (0 disables)
    pub stuck_cycles: u32,
    /// Smallest plausible accelerometer magnitude in g; shorter vectors are faults
    pub min_accel_g: f32,
    pub max_accel_g: f32,
    pub max_gyro_dps: f32,
}

impl Default for FaultCfg {
    fn default() -> Self {
        Self {
            stuck_cycles: 50,
            min_accel_g: 0.3,
            max_accel_g: 16.0,
            max_gyro_dps: 2000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuzzerCfg {
    /// BCM GPIO pin driving the piezo (hardware backend only)
    pub pin: u8,
}

impl Default for BuzzerCfg {
    fn default() -> Self {
        Self { pin: 18 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorCfg,
    pub calibration: CalibrationCfg,
    pub posture: PostureCfg,
    pub motion: MotionCfg,
    pub budget: BudgetCfg,
    pub alerts: AlertsCfg,
    pub runner: RunnerCfg,
    pub fault: FaultCfg,
    pub buzzer: BuzzerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MilestoneToml {
    Tuple((u64, LevelName)),
    Table { at_ms: u64, level: LevelName },
}

fn de_milestones<'de, D>(deserializer: D) -> Result<Vec<(u64, LevelName)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<MilestoneToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for m in items {
            match m {
                MilestoneToml::Tuple((at_ms, level)) => out.push((at_ms, level)),
                MilestoneToml::Table { at_ms, level } => out.push((at_ms, level)),
            }
        }
    }
    Ok(out)
}

pub fn load_replay_csv(path: &std::path::Path) -> eyre::Result<Vec<ReplayRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open replay CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["ax", "ay", "az", "gx", "gy", "gz"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "replay CSV must have headers 'ax,ay,az,gx,gy,gz', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ReplayRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("replay CSV {:?} has no samples", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }
        if self.sensor.i2c_address > 0x7F {
            eyre::bail!("sensor.i2c_address must be a 7-bit address");
        }

        // Calibration
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }
        if self.calibration.samples > 10_000 {
            eyre::bail!("calibration.samples is unreasonably large (>10000)");
        }

        // Posture
        let t = self.posture.threshold_deg;
        if !t.is_finite() || t <= 0.0 || t >= 90.0 {
            eyre::bail!("posture.threshold_deg must be in (0.0, 90.0)");
        }
        let h = self.posture.hysteresis_deg;
        if !h.is_finite() || h < 0.0 || h >= t {
            eyre::bail!("posture.hysteresis_deg must be in [0.0, threshold_deg)");
        }

        // Motion
        let g = self.motion.gyro_threshold_dps;
        if !g.is_finite() || g <= 0.0 {
            eyre::bail!("motion.gyro_threshold_dps must be > 0");
        }

        // Budget
        if self.budget.window_ms == 0 {
            eyre::bail!("budget.window_ms must be >= 1");
        }
        if self.budget.window_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("budget.window_ms is unreasonably large (>24h)");
        }

        // Alerts
        match self.alerts.profile {
            AlertProfile::Custom => {
                if self.alerts.milestones.is_empty() {
                    eyre::bail!("alerts.milestones must not be empty when profile = \"custom\"");
                }
                validate_milestones(&self.alerts.milestones, self.budget.window_ms)?;
            }
            AlertProfile::Progressive | AlertProfile::Testing => {
                if !self.alerts.milestones.is_empty() {
                    eyre::bail!("alerts.milestones is only used with profile = \"custom\"");
                }
            }
        }

        // Runner
        if self.runner.period_ms == 0 {
            eyre::bail!("runner.period_ms must be >= 1");
        }
        if self.runner.period_ms > 10_000 {
            eyre::bail!("runner.period_ms is unreasonably large (>10s)");
        }
        if self.runner.telemetry_buffer == 0 {
            eyre::bail!("runner.telemetry_buffer must be >= 1");
        }

        // Fault
        if !(self.fault.min_accel_g.is_finite()
            && self.fault.min_accel_g > 0.0
            && self.fault.min_accel_g < 1.0)
        {
            eyre::bail!("fault.min_accel_g must be in (0.0, 1.0)");
        }
        if !(self.fault.max_accel_g.is_finite() && self.fault.max_accel_g > 1.0) {
            eyre::bail!("fault.max_accel_g must be > 1.0");
        }
        if !(self.fault.max_gyro_dps.is_finite()
            && self.fault.max_gyro_dps > self.motion.gyro_threshold_dps)
        {
            eyre::bail!("fault.max_gyro_dps must be > motion.gyro_threshold_dps");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

fn validate_milestones(table: &[(u64, LevelName)], window_ms: u64) -> eyre::Result<()> {
    for (i, (at_ms, _)) in table.iter().enumerate() {
        if *at_ms == 0 {
            eyre::bail!("alerts.milestones[{i}].at_ms must be > 0");
        }
        if *at_ms > window_ms {
            eyre::bail!("alerts.milestones[{i}].at_ms exceeds budget.window_ms ({window_ms})");
        }
    }
    for (i, pair) in table.windows(2).enumerate() {
        let (a_ms, a_lvl) = pair[0];
        let (b_ms, b_lvl) = pair[1];
        if b_ms <= a_ms {
            eyre::bail!(
                "alerts.milestones must be strictly increasing (entry {} at {b_ms} ms)",
                i + 1
            );
        }
        if b_lvl < a_lvl {
            eyre::bail!(
                "alerts.milestones levels must not decrease (entry {} is {b_lvl:?} after {a_lvl:?})",
                i + 1
            );
        }
    }
    Ok(())
}
