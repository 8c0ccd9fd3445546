//! This crate provides the codec for talking to remote prepaid energy meters over Modbus RTU.
//!
//! The meters are reached through a store-and-forward transport, so frames travel as text:
//! hex when an operator types them, base64 in the transport's payloads. The crate covers:
//! * CRC16 checksums ([`crc`]).
//! * Hex and base64 conversions ([`transcode`]).
//! * Building write and read requests ([`frame`], [`command`]).
//! * Parsing and interpreting replies ([`response`], [`register`], [`scaling`]).
//! * Keeping named command frames ([`registry`]) and a catalogue of read commands ([`catalog`]).
//!
//! Frames use the usual Modbus RTU layout:
//! * Unit ID: 0x01 by default.
//! * Payload fields: big-endian.
//! * Checksum: CRC16 (poly 0xA001), low byte first.
//!
//! Nothing here performs I/O on the transport. Log events are emitted through `tracing`, and
//! installing a subscriber is left to the application.

pub mod catalog;
pub mod command;
pub mod crc;
pub mod error;
pub mod frame;
pub mod register;
pub mod registry;
pub mod response;
pub mod scaling;
pub mod transcode;

pub use error::{Error, Result};
