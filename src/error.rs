//! Our error types for the meter codec.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error type for building, parsing and storing meter frames.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid hex input: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("Invalid base64 input: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Malformed frame: {0}")]
    Malformed(&'static str),
    #[error("Modbus protocol error: {0}")]
    ModbusError(rmodbus::ErrorKind),
    #[error("Checksum mismatch: computed {computed:02X?}, received {received:02X?}")]
    ChecksumError { computed: [u8; 2], received: [u8; 2] },
    #[error("Value {value} outside of range {min}..={max}")]
    InvalidRange { value: f64, min: f64, max: f64 },
    #[error("Command has no fixed value")]
    MissingValue,
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rmodbus::ErrorKind> for Error {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::ModbusError(err)
    }
}
