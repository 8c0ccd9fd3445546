//! Modbus CRC16 checksum.
//!
//! The checksum is transmitted low byte first, unlike the big-endian fields of the payload.

use crate::error::{Error, Result};

const POLYNOMIAL: u16 = 0xA001;

/// Compute the Modbus CRC16 of `data` as a plain integer.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc >>= 1;
                crc ^= POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Return the checksum of `data` in wire order, `(low, high)`.
pub fn checksum(data: &[u8]) -> (u8, u8) {
    let [low, high] = crc16(data).to_le_bytes();
    (low, high)
}

/// Copy `data` and append its checksum.
pub fn append_checksum(data: &[u8]) -> Vec<u8> {
    let (low, high) = checksum(data);
    let mut frame = Vec::with_capacity(data.len() + 2);
    frame.extend_from_slice(data);
    frame.push(low);
    frame.push(high);
    frame
}

/// Check that the last two bytes of `frame` are the checksum of everything before them.
pub fn verify(frame: &[u8]) -> Result<()> {
    if frame.len() < 2 {
        return Err(Error::Malformed("frame too short to carry a checksum"));
    }
    let (body, received) = frame.split_at(frame.len() - 2);
    let (low, high) = checksum(body);
    if received != [low, high] {
        return Err(Error::ChecksumError {
            computed: [low, high],
            received: [received[0], received[1]],
        });
    }
    Ok(())
}
