//! Construction of outbound command frames.
//!
//! Every frame is `unit id ++ function code ++ payload ++ checksum`, where payload fields are
//! big-endian and the checksum is little-endian. Requests are generated by rmodbus and split
//! back into a [`CommandFrame`].

use rmodbus::{ModbusProto, client::ModbusRequest};

use crate::{
    crc,
    error::{Error, Result},
    transcode,
};

/// Function code for reading holding registers.
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
/// Function code for reading input registers.
pub const READ_INPUT_REGISTERS: u8 = 0x04;
/// Function code for writing a single register.
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Function code for writing multiple, sequential registers.
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Unit id the meters ship with.
pub const DEFAULT_UNIT_ID: u8 = 0x01;

/// A complete command frame. The checksum always matches the rest of the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    address: u8,
    function: u8,
    payload: Vec<u8>,
    checksum: (u8, u8),
}

impl CommandFrame {
    /// Assemble a frame and compute its checksum.
    pub fn new(address: u8, function: u8, payload: Vec<u8>) -> Self {
        let mut body = Vec::with_capacity(payload.len() + 2);
        body.push(address);
        body.push(function);
        body.extend_from_slice(&payload);
        let checksum = crc::checksum(&body);

        Self {
            address,
            function,
            payload,
            checksum,
        }
    }

    /// Split a complete frame as sent on the wire, checking its checksum.
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Malformed("frame shorter than 4 bytes"));
        }
        crc::verify(bytes)?;
        let (body, checksum) = bytes.split_at(bytes.len() - 2);

        Ok(Self {
            address: body[0],
            function: body[1],
            payload: body[2..].to_vec(),
            checksum: (checksum[0], checksum[1]),
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn function(&self) -> u8 {
        self.function
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Checksum as `(low, high)`, in the order it is transmitted.
    pub fn checksum(&self) -> (u8, u8) {
        self.checksum
    }

    /// The frame without its checksum.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.payload.len() + 2);
        body.push(self.address);
        body.push(self.function);
        body.extend_from_slice(&self.payload);
        body
    }

    /// The full frame as sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.body();
        bytes.push(self.checksum.0);
        bytes.push(self.checksum.1);
        bytes
    }

    pub fn to_hex(&self) -> String {
        transcode::format_hex(&self.to_bytes())
    }

    pub fn to_base64(&self) -> String {
        transcode::to_base64(&self.to_bytes())
    }
}

/// Room for the largest request we generate, a 13 byte write of two registers.
const FRAME_CAPACITY: usize = 32;

/// Builds command frames addressed to a single meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuilder {
    /// Default for the meters is 0x01.
    unit_id: u8,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_ID)
    }
}

impl FrameBuilder {
    pub const fn new(unit_id: u8) -> Self {
        Self { unit_id }
    }

    pub const fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Write a 16-bit value to a single register.
    ///
    /// Signed values should be passed through `as u16`, which wraps them into two's complement.
    pub fn write_single_register(&self, address: u16, value: u16) -> Result<CommandFrame> {
        let mut buff: heapless::Vec<u8, FRAME_CAPACITY> = heapless::Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_set_holding(address, value, &mut buff)?;
        CommandFrame::from_wire(&buff)
    }

    /// Write a 32-bit value across two sequential registers, high word first.
    pub fn write_multiple_registers(&self, address: u16, value: u32) -> Result<CommandFrame> {
        let words = [(value >> 16) as u16, value as u16];

        let mut buff: heapless::Vec<u8, FRAME_CAPACITY> = heapless::Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_set_holdings_bulk(address, &words, &mut buff)?;
        CommandFrame::from_wire(&buff)
    }

    /// Read `count` holding registers starting at `address`.
    pub fn read_holding_registers(&self, address: u16, count: u16) -> Result<CommandFrame> {
        let mut buff: heapless::Vec<u8, FRAME_CAPACITY> = heapless::Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_get_holdings(address, count, &mut buff)?;
        CommandFrame::from_wire(&buff)
    }
}
