use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("sensor timeout")]
    Timeout,
    #[error("sensor disconnected")]
    Disconnected,
    #[error("invalid simulator setting: {0}")]
    Config(String),
    #[error("unexpected device id 0x{0:02x}")]
    WrongDevice(u8),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
