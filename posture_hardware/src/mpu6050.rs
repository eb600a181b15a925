//! MPU-6050 six-axis IMU over Linux I2C.
//!
//! Configured for the ±2 g accelerometer and ±250 °/s gyro ranges; samples
//! are read as one 14-byte burst so accel and gyro come from the same
//! conversion.

use std::time::Duration;

use posture_traits::{ImuReading, ImuSensor};
use rppal::i2c::I2c;

use crate::error::{HwError, Result};
use crate::util::poll_until_ready;

pub const DEFAULT_ADDRESS: u16 = 0x68;

const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_INT_STATUS: u8 = 0x3A;
const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I_VALUE: u8 = 0x68;
const DATA_RDY: u8 = 0x01;

const ACCEL_LSB_PER_G: f32 = 16_384.0;
const GYRO_LSB_PER_DPS: f32 = 131.0;

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    HwError::I2c(e.to_string())
}

pub struct Mpu6050 {
    bus: I2c,
}

impl Mpu6050 {
    /// Open `bus`, verify the device identity and wake it from sleep.
    pub fn new(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        i2c.set_slave_address(address).map_err(i2c_err)?;
        let who = i2c.smbus_read_byte(REG_WHO_AM_I).map_err(i2c_err)?;
        if who != WHO_AM_I_VALUE {
            return Err(HwError::WrongDevice(who));
        }
        i2c.smbus_write_byte(REG_PWR_MGMT_1, 0x00).map_err(i2c_err)?;
        i2c.smbus_write_byte(REG_ACCEL_CONFIG, 0x00).map_err(i2c_err)?;
        i2c.smbus_write_byte(REG_GYRO_CONFIG, 0x00).map_err(i2c_err)?;
        tracing::info!(bus, address = %format!("0x{address:02x}"), "mpu6050 ready");
        Ok(Mpu6050 { bus: i2c })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<ImuReading> {
        let bus = &self.bus;
        poll_until_ready(
            || {
                let status = bus.smbus_read_byte(REG_INT_STATUS).map_err(i2c_err)?;
                Ok(status & DATA_RDY != 0)
            },
            timeout,
            Duration::from_micros(500),
        )?;
        let mut raw = [0u8; 14];
        self.bus
            .block_read(REG_ACCEL_XOUT_H, &mut raw)
            .map_err(i2c_err)?;
        Ok(decode(&raw))
    }
}

/// Decode a burst starting at ACCEL_XOUT_H: accel xyz, temperature, gyro xyz.
fn decode(raw: &[u8; 14]) -> ImuReading {
    let word = |i: usize| f32::from(i16::from_be_bytes([raw[i], raw[i + 1]]));
    ImuReading::new(
        [
            word(0) / ACCEL_LSB_PER_G,
            word(2) / ACCEL_LSB_PER_G,
            word(4) / ACCEL_LSB_PER_G,
        ],
        [
            word(8) / GYRO_LSB_PER_DPS,
            word(10) / GYRO_LSB_PER_DPS,
            word(12) / GYRO_LSB_PER_DPS,
        ],
    )
}

impl ImuSensor for Mpu6050 {
    fn read(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<ImuReading, Box<dyn std::error::Error + Send + Sync>> {
        match self.read_with_timeout(timeout) {
            Ok(r) => Ok(r),
            Err(e) => {
                tracing::debug!(error = %e, "mpu6050 read failed");
                Err(Box::new(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_scales_full_range() {
        let mut raw = [0u8; 14];
        // accel z = +1 g, gyro x = -250 dps
        raw[4..6].copy_from_slice(&16_384i16.to_be_bytes());
        raw[8..10].copy_from_slice(&(-32_750i16).to_be_bytes());
        let r = decode(&raw);
        assert!((r.accel_g[2] - 1.0).abs() < 1e-6);
        assert!((r.gyro_dps[0] + 250.0).abs() < 0.1);
    }
}
