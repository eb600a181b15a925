//! Piezo buzzer on a GPIO pin driven with software PWM at 50% duty.

use posture_traits::Buzzer;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

pub struct GpioBuzzer {
    pin: OutputPin,
}

impl GpioBuzzer {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        pin.set_low();
        Ok(GpioBuzzer { pin })
    }
}

impl Buzzer for GpioBuzzer {
    fn tone(&mut self, freq_hz: u32) -> std::result::Result<(), BoxErr> {
        self.pin
            .set_pwm_frequency(f64::from(freq_hz), 0.5)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(())
    }

    fn silence(&mut self) -> std::result::Result<(), BoxErr> {
        self.pin
            .clear_pwm()
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for GpioBuzzer {
    fn drop(&mut self) {
        let _ = self.pin.clear_pwm();
        self.pin.set_low();
    }
}
