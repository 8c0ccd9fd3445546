//! This module is used to define the registers on the energy meters.
//!
//! Register numbers double as the "register key" the read commands are filed under, so
//! `"128"` and `0x0080` refer to the same relay status register.

use core::fmt;

use modular_bitfield::prelude::*;
use strum_macros::{EnumIter, FromRepr};

#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, FromRepr)]
#[repr(u16)]
pub enum MeterRegister {
    /// __W__ - Energy recharge.
    ///
    /// Value is in 0.01 kWh. E.g. 1 kWh => `100`.
    EnergyRecharge = 22,
    /// __R__ - Total consumed energy, 0.01 kWh.
    TotalEnergy = 104,
    /// __R__ - Remaining prepaid energy, 0.01 kWh.
    RemainingEnergy = 106,
    /// __R__ - Remaining prepaid amount, 4 bytes in 0.0001 of the currency.
    RemainingAmount = 108,
    /// __R__ - Total recharged amount, 4 bytes in 0.0001 of the currency.
    TotalRechargedAmount = 112,
    /// __R__ - Total recharged energy, 0.01 kWh.
    TotalRechargedEnergy = 116,
    /// __R__ - Total consumed amount, 4 bytes in 0.0001 of the currency.
    ConsumedAmount = 118,
    /// __R__ - Active power in W.
    ActivePower = 122,
    /// __R__ - Reactive power in Var.
    ReactivePower = 123,
    /// __R__ - Voltage, 0.01 V.
    Voltage = 124,
    /// __R__ - Current, 0.01 A.
    Current = 125,
    /// __R__ - Power factor, 0.001.
    PowerFactor = 126,
    /// __R__ - Grid frequency, 0.01 Hz.
    Frequency = 127,
    /// __R__ - Relay status.
    ///
    /// See [`RelayStatus`].
    RelayStatus = 128,
    /// __R/W__ - Working mode.
    ///
    /// See [`WorkingMode`].
    WorkingMode = 129,
    /// __R/W__ - Overcurrent threshold, 0.01 A.
    OvercurrentThreshold = 134,
    /// __R/W__ - Overcurrent trip time in minutes.
    OvercurrentTripTime = 135,
    /// __R__ - Working status.
    ///
    /// See [`WorkingStatus`].
    WorkingStatus = 136,
    /// __R__ - Signal strength in percent.
    SignalStrength = 137,
    /// __R/W__ - Data reporting interval in minutes.
    ReportingInterval = 162,
    /// __R/W__ - Switch-off timer, 32 bits of seconds.
    ///
    /// `0` means no timer is active.
    SwitchOffTimer = 167,
}

impl From<MeterRegister> for u16 {
    fn from(value: MeterRegister) -> Self {
        value as u16
    }
}

impl MeterRegister {
    /// Look up a register by its textual key, e.g. `"128"`.
    pub fn from_key(key: &str) -> Option<Self> {
        key.trim().parse::<u16>().ok().and_then(Self::from_repr)
    }
}

/// Relay status register bits.
///
/// * bit 0 - `1` closed, `0` open.
/// * bit 1 - `1` fault, `0` normal.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatus {
    pub closed: bool,
    pub fault: bool,
    #[skip]
    __: B14,
}

impl From<u16> for RelayStatus {
    fn from(value: u16) -> Self {
        RelayStatus::from_bytes(value.to_le_bytes())
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relay = if self.closed() { "Closed" } else { "Open" };
        let health = if self.fault() { "Fault" } else { "Normal" };
        write!(f, "{relay} ({health})")
    }
}

/// Billing mode of the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum WorkingMode {
    Postpaid = 0x00,
    EnergyPrepaid = 0x01,
    AmountPrepaid = 0x02,
    /// Any value outside of the known modes.
    Unknown = 0xFFFF,
}

impl From<u16> for WorkingMode {
    fn from(value: u16) -> Self {
        match value {
            0x00 => WorkingMode::Postpaid,
            0x01 => WorkingMode::EnergyPrepaid,
            0x02 => WorkingMode::AmountPrepaid,
            _ => WorkingMode::Unknown,
        }
    }
}

impl fmt::Display for WorkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkingMode::Postpaid => "Postpaid",
            WorkingMode::EnergyPrepaid => "Energy prepaid",
            WorkingMode::AmountPrepaid => "Amount prepaid",
            WorkingMode::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Network join stage, held in the low byte of the working status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum WorkingStage {
    ConfigFailure,
    ConfigStage,
    NetworkStage,
    CommStage,
    Unknown,
}

impl From<u8> for WorkingStage {
    fn from(value: u8) -> Self {
        match value {
            0x00 => WorkingStage::ConfigFailure,
            0x01 => WorkingStage::ConfigStage,
            0x02 => WorkingStage::NetworkStage,
            0x03 => WorkingStage::CommStage,
            _ => WorkingStage::Unknown,
        }
    }
}

impl fmt::Display for WorkingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkingStage::ConfigFailure => "Config failure",
            WorkingStage::ConfigStage => "Config stage",
            WorkingStage::NetworkStage => "Network stage",
            WorkingStage::CommStage => "Comm stage",
            WorkingStage::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// "Working status register": high byte is the last completed step, low byte the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingStatus {
    pub last_step: u8,
    pub stage: WorkingStage,
}

impl From<u16> for WorkingStatus {
    fn from(value: u16) -> Self {
        let [high, low] = value.to_be_bytes();
        Self {
            last_step: high,
            stage: WorkingStage::from(low),
        }
    }
}

impl fmt::Display for WorkingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Last step: {}, Status: {}", self.last_step, self.stage)
    }
}
