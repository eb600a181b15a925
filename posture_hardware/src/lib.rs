pub mod error;
pub mod util;

#[cfg(feature = "hardware")]
pub mod gpio_buzzer;
#[cfg(feature = "hardware")]
pub mod mpu6050;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use posture_traits::{Buzzer, ImuReading, ImuSensor, tilt_to_accel};

use crate::error::HwError;

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

/// Environment variables read by [`SimulatedImu::from_env`].
pub const SIM_PITCH_ENV: &str = "POSTURE_SIM_PITCH";
pub const SIM_ROLL_ENV: &str = "POSTURE_SIM_ROLL";
pub const SIM_GYRO_ENV: &str = "POSTURE_SIM_GYRO";
pub const SIM_FAIL_ENV: &str = "POSTURE_SIM_FAIL";

/// Shared pose of a simulated wearer; clones observe the same values.
#[derive(Clone, Debug, Default)]
pub struct SimPose {
    pitch_deg: Rc<Cell<f32>>,
    roll_deg: Rc<Cell<f32>>,
    gyro_dps: Rc<Cell<f32>>,
}

impl SimPose {
    pub fn set_pitch(&self, deg: f32) {
        self.pitch_deg.set(deg);
    }
    pub fn set_roll(&self, deg: f32) {
        self.roll_deg.set(deg);
    }
    pub fn set_gyro(&self, dps: f32) {
        self.gyro_dps.set(dps);
    }
    pub fn pitch(&self) -> f32 {
        self.pitch_deg.get()
    }
}

/// Simulated IMU strapped to a wearer holding a fixed pose.
///
/// Every sample carries a small deterministic dither so the output is never
/// bit-identical between reads (a real MEMS part never is either).
pub struct SimulatedImu {
    pose: SimPose,
    fail_after: Option<u64>,
    reads: u64,
    noise: u32,
}

impl SimulatedImu {
    pub fn new() -> Self {
        SimulatedImu {
            pose: SimPose::default(),
            fail_after: None,
            reads: 0,
            noise: 0x9E37_79B9,
        }
    }

    /// Build from `POSTURE_SIM_*` environment variables.
    pub fn from_env() -> Result<Self, HwError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// `POSTURE_SIM_FAIL=N` makes every read after the first `N` fail with
    /// [`HwError::Disconnected`]; `0` fails from the start.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HwError> {
        let parse = |key: &str| -> Result<Option<f32>, HwError> {
            match lookup(key) {
                None => Ok(None),
                Some(v) => v
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .map(Some)
                    .ok_or_else(|| HwError::Config(format!("{key}={v:?} is not a number"))),
            }
        };
        let sim = Self::new();
        if let Some(p) = parse(SIM_PITCH_ENV)? {
            sim.pose.set_pitch(p);
        }
        if let Some(r) = parse(SIM_ROLL_ENV)? {
            sim.pose.set_roll(r);
        }
        if let Some(g) = parse(SIM_GYRO_ENV)? {
            sim.pose.set_gyro(g);
        }
        let fail_after = match lookup(SIM_FAIL_ENV) {
            None => None,
            Some(v) => Some(v.trim().parse::<u64>().map_err(|_| {
                HwError::Config(format!("{SIM_FAIL_ENV}={v:?} is not a read count"))
            })?),
        };
        Ok(sim.with_fail_after(fail_after))
    }

    pub fn with_pose(mut self, pitch_deg: f32, roll_deg: f32, gyro_dps: f32) -> Self {
        self.pose = SimPose::default();
        self.pose.set_pitch(pitch_deg);
        self.pose.set_roll(roll_deg);
        self.pose.set_gyro(gyro_dps);
        self
    }

    pub fn with_fail_after(mut self, reads: Option<u64>) -> Self {
        self.fail_after = reads;
        self
    }

    /// Handle for moving the simulated wearer while the sensor is in use.
    pub fn pose(&self) -> SimPose {
        self.pose.clone()
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    // xorshift32 mapped to [-1, 1)
    fn dither(&mut self) -> f32 {
        let mut x = self.noise;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl Default for SimulatedImu {
    fn default() -> Self {
        Self::new()
    }
}

impl ImuSensor for SimulatedImu {
    fn read(&mut self, _timeout: Duration) -> Result<ImuReading, BoxErr> {
        if let Some(limit) = self.fail_after
            && self.reads >= limit
        {
            return Err(Box::new(HwError::Disconnected));
        }
        self.reads += 1;
        let [x, y, z] = tilt_to_accel(self.pose.pitch_deg.get(), self.pose.roll_deg.get());
        let accel = [
            x + 0.002 * self.dither(),
            y + 0.002 * self.dither(),
            z + 0.002 * self.dither(),
        ];
        let gyro = [
            self.pose.gyro_dps.get() + 0.2 * self.dither(),
            0.2 * self.dither(),
            0.2 * self.dither(),
        ];
        tracing::trace!(reads = self.reads, ?accel, ?gyro, "imu sample (simulated)");
        Ok(ImuReading::new(accel, gyro))
    }
}

/// Plays back a recorded session; reports a disconnect once exhausted.
pub struct ReplayImu {
    rows: Vec<ImuReading>,
    pos: usize,
}

impl ReplayImu {
    pub fn new(rows: Vec<ImuReading>) -> Self {
        ReplayImu { rows, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.pos
    }
}

impl ImuSensor for ReplayImu {
    fn read(&mut self, _timeout: Duration) -> Result<ImuReading, BoxErr> {
        let row = self.rows.get(self.pos).copied().ok_or(HwError::Disconnected)?;
        self.pos += 1;
        Ok(row)
    }
}

/// Buzzer that only logs; `current()` reports the tone being played.
#[derive(Debug, Default)]
pub struct SimulatedBuzzer {
    current: Option<u32>,
    changes: u64,
}

impl SimulatedBuzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    /// Number of tone/silence transitions issued so far.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl Buzzer for SimulatedBuzzer {
    fn tone(&mut self, freq_hz: u32) -> Result<(), BoxErr> {
        tracing::debug!(freq_hz, "buzzer tone (simulated)");
        self.current = Some(freq_hz);
        self.changes += 1;
        Ok(())
    }

    fn silence(&mut self) -> Result<(), BoxErr> {
        tracing::debug!("buzzer silent (simulated)");
        self.current = None;
        self.changes += 1;
        Ok(())
    }
}
