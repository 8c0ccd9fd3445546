//! Parsing of frames received from the meter.
//!
//! Frames are classified by function code. Read replies (0x03/0x04) and single register write
//! echoes (0x06) are decoded, anything else is reported as `Ok(None)` so the operator can be told
//! the frame could not be analysed automatically.

use tracing::{debug, warn};

use crate::{
    crc,
    error::{Error, Result},
    frame::{READ_HOLDING_REGISTERS, READ_INPUT_REGISTERS, WRITE_SINGLE_REGISTER},
    scaling::{self, DisplayValue},
    transcode,
};

/// Slave, function and byte count.
const READ_HEADER_LEN: usize = 3;
/// Slave, function, register address and register value.
const WRITE_ECHO_LEN: usize = 6;
const CHECKSUM_LEN: usize = 2;

/// A successfully decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    Read(ReadResponse),
    Write(WriteResponse),
}

impl ParsedFrame {
    pub fn slave(&self) -> u8 {
        match self {
            ParsedFrame::Read(read) => read.slave,
            ParsedFrame::Write(write) => write.slave,
        }
    }

    pub fn function(&self) -> u8 {
        match self {
            ParsedFrame::Read(read) => read.function,
            ParsedFrame::Write(write) => write.function,
        }
    }

    /// Value scaled by the generic divisor for this kind of frame.
    pub fn default_display(&self) -> DisplayValue {
        match self {
            ParsedFrame::Read(read) => read.default_display(),
            ParsedFrame::Write(write) => write.default_display(),
        }
    }

    /// Interpret the value with the rule of `register`.
    ///
    /// Write echoes carry their own register address, which takes precedence.
    pub fn interpret(&self, register: u16) -> DisplayValue {
        match self {
            ParsedFrame::Read(read) => read.interpret(register),
            ParsedFrame::Write(write) => write.interpret(),
        }
    }
}

/// Reply to a read holding/input registers request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub slave: u8,
    pub function: u8,
    pub byte_count: u8,
    pub data: Vec<u8>,
}

impl ReadResponse {
    /// The data bytes as one big-endian integer.
    ///
    /// Returns `None` when there are more than 16 data bytes. The display methods handle any
    /// width.
    pub fn raw_value(&self) -> Option<u128> {
        if self.data.len() > 16 {
            return None;
        }
        Some(
            self.data
                .iter()
                .fold(0u128, |acc, &byte| (acc << 8) | byte as u128),
        )
    }

    /// Divisor used when no register rule is known: 10000 for 32-bit values, 100 otherwise.
    pub fn default_divisor(&self) -> u32 {
        match self.byte_count {
            4 => 10_000,
            _ => 100,
        }
    }

    pub fn default_display(&self) -> DisplayValue {
        let decimals = match self.default_divisor() {
            10_000 => 4,
            _ => 2,
        };
        DisplayValue::Quantity {
            value: scaling::be_value(&self.data) / self.default_divisor() as f64,
            decimals,
            unit: "",
        }
    }

    pub fn interpret(&self, register: u16) -> DisplayValue {
        scaling::rule_for(register).decode_bytes(&self.data)
    }
}

/// Echo of a single register write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub slave: u8,
    pub function: u8,
    pub register_address: u16,
    pub register_value: u16,
}

impl WriteResponse {
    pub fn default_display(&self) -> DisplayValue {
        DisplayValue::Quantity {
            value: self.register_value as f64 / 100.0,
            decimals: 2,
            unit: "",
        }
    }

    pub fn interpret(&self) -> DisplayValue {
        scaling::rule_for(self.register_address).decode(self.register_value as u64)
    }
}

/// Parse a response given as hex text.
pub fn parse_response(raw: &str) -> Result<Option<ParsedFrame>> {
    let bytes = transcode::parse_hex(raw)?;
    parse_frame(&bytes)
}

/// Parse a response given as base64 text, the form the meter's uplink arrives in.
pub fn parse_base64_response(raw: &str) -> Result<Option<ParsedFrame>> {
    let bytes = transcode::from_base64(raw)?;
    parse_frame(&bytes)
}

/// Parse a response from raw bytes, checksum included.
pub fn parse_frame(bytes: &[u8]) -> Result<Option<ParsedFrame>> {
    if bytes.len() < READ_HEADER_LEN {
        return Err(Error::Malformed("frame shorter than 3 bytes"));
    }

    let function = bytes[1];
    let is_read = matches!(function, READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS);

    // A truncated read reply is malformed regardless of what its last two bytes hold.
    if is_read {
        let byte_count = bytes[2] as usize;
        if bytes.len() != READ_HEADER_LEN + byte_count + CHECKSUM_LEN {
            debug!(
                declared = byte_count,
                length = bytes.len(),
                "Read reply length does not match byte count"
            );
            return Err(Error::Malformed("byte count does not match frame length"));
        }
    }

    if let Err(err) = crc::verify(bytes) {
        warn!(frame = %transcode::format_hex(bytes), "Rejecting frame: {}", err);
        return Err(err);
    }
    let body = &bytes[..bytes.len() - CHECKSUM_LEN];

    if is_read {
        return Ok(Some(ParsedFrame::Read(ReadResponse {
            slave: body[0],
            function,
            byte_count: body[2],
            data: body[READ_HEADER_LEN..].to_vec(),
        })));
    }

    if function == WRITE_SINGLE_REGISTER && body.len() == WRITE_ECHO_LEN {
        return Ok(Some(ParsedFrame::Write(WriteResponse {
            slave: body[0],
            function,
            register_address: u16::from_be_bytes([body[2], body[3]]),
            register_value: u16::from_be_bytes([body[4], body[5]]),
        })));
    }

    debug!(function, length = bytes.len(), "Unrecognised frame");
    Ok(None)
}
