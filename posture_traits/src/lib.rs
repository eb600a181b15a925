pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// One synchronous IMU sample.
///
/// `accel_g` is calibrated acceleration in g, `gyro_dps` angular rate in
/// degrees per second. Axis order is x (forward), y (lateral), z (vertical).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuReading {
    pub accel_g: [f32; 3],
    pub gyro_dps: [f32; 3],
}

impl ImuReading {
    pub const fn new(accel_g: [f32; 3], gyro_dps: [f32; 3]) -> Self {
        Self { accel_g, gyro_dps }
    }
}

/// Unit gravity vector a still sensor tilted by `(pitch_deg, roll_deg)`
/// reports, in the `ImuReading` axis order. Valid for |angle| < 90°.
pub fn tilt_to_accel(pitch_deg: f32, roll_deg: f32) -> [f32; 3] {
    let x = pitch_deg.to_radians().tan();
    let y = roll_deg.to_radians().tan();
    let norm = (x * x + y * y + 1.0).sqrt();
    [x / norm, y / norm, 1.0 / norm]
}

pub trait ImuSensor {
    /// Read one sample. Implementations must return an error, never zeros or
    /// a stale value, when the device is unreachable.
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<ImuReading, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait Buzzer {
    fn tone(&mut self, freq_hz: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn silence(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: ImuSensor + ?Sized> ImuSensor for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<ImuReading, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: Buzzer + ?Sized> Buzzer for Box<T> {
    fn tone(&mut self, freq_hz: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).tone(freq_hz)
    }
    fn silence(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).silence()
    }
}
