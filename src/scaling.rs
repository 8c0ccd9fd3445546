//! Interpretation rules for raw register values.
//!
//! Each register converts its raw integer into something an operator can read, either a scaled
//! quantity with a unit or a discrete label. Registers without a rule use [`RegisterRule::DEFAULT`].

use core::fmt;

use crate::register::{MeterRegister, RelayStatus, WorkingMode, WorkingStatus};

/// Unit label used for monetary counters.
///
/// The meters are deployed with prices in South African rand, and report money in 0.0001 of it.
pub const CURRENCY_UNIT: &str = "Rand";

/// How a raw register value should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `raw * scale`, printed with a fixed number of decimals.
    Scaled,
    /// See [`RelayStatus`].
    RelayBits,
    /// See [`WorkingMode`].
    WorkingMode,
    /// See [`WorkingStatus`].
    WorkingStatus,
    /// Remaining seconds of the switch-off timer, `0` when none is running.
    SwitchOffTimer,
}

/// Rule for converting a raw register value to a display value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterRule {
    /// Multiplier applied to the raw value.
    pub scale: f64,
    /// Number of decimals shown, matching the resolution of `scale`.
    pub decimals: usize,
    pub unit: &'static str,
    pub kind: RuleKind,
}

impl RegisterRule {
    /// Used for any register without a rule of its own.
    pub const DEFAULT: RegisterRule = RegisterRule::scaled(0.01, 2, "");

    pub const fn scaled(scale: f64, decimals: usize, unit: &'static str) -> Self {
        Self {
            scale,
            decimals,
            unit,
            kind: RuleKind::Scaled,
        }
    }

    /// A rule for values which are already in their unit.
    pub const fn raw(unit: &'static str) -> Self {
        Self::scaled(1.0, 0, unit)
    }

    const fn label(kind: RuleKind) -> Self {
        Self {
            scale: 1.0,
            decimals: 0,
            unit: "",
            kind,
        }
    }

    /// Decode a raw register value.
    ///
    /// Label rules look at the low 16 bits only.
    pub fn decode(&self, raw: u64) -> DisplayValue {
        let word = raw as u16;
        match self.kind {
            RuleKind::Scaled => self.quantity(raw as f64),
            RuleKind::RelayBits => DisplayValue::Relay(RelayStatus::from(word)),
            RuleKind::WorkingMode => DisplayValue::Mode(WorkingMode::from(word)),
            RuleKind::WorkingStatus => DisplayValue::Status(WorkingStatus::from(word)),
            RuleKind::SwitchOffTimer => DisplayValue::Timer { seconds: raw },
        }
    }

    /// Decode the big-endian data bytes of a read reply, however many there are.
    ///
    /// Quantities use every byte. Other rules use the low 64 bits.
    pub fn decode_bytes(&self, data: &[u8]) -> DisplayValue {
        match self.kind {
            RuleKind::Scaled => self.quantity(be_value(data)),
            _ => {
                let low = &data[data.len().saturating_sub(8)..];
                self.decode(low.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64))
            }
        }
    }

    fn quantity(&self, raw: f64) -> DisplayValue {
        DisplayValue::Quantity {
            value: raw * self.scale,
            decimals: self.decimals,
            unit: self.unit,
        }
    }
}

impl MeterRegister {
    /// Get the interpretation rule for this register.
    pub const fn rule(&self) -> RegisterRule {
        use MeterRegister as MR;
        match self {
            MR::EnergyRecharge
            | MR::TotalEnergy
            | MR::RemainingEnergy
            | MR::TotalRechargedEnergy => RegisterRule::scaled(0.01, 2, "kWh"),
            MR::RemainingAmount | MR::TotalRechargedAmount | MR::ConsumedAmount => {
                RegisterRule::scaled(0.0001, 4, CURRENCY_UNIT)
            }
            MR::ActivePower => RegisterRule::raw("W"),
            MR::ReactivePower => RegisterRule::raw("Var"),
            MR::Voltage => RegisterRule::scaled(0.01, 2, "V"),
            MR::Current | MR::OvercurrentThreshold => RegisterRule::scaled(0.01, 2, "A"),
            MR::PowerFactor => RegisterRule::scaled(0.001, 3, ""),
            MR::Frequency => RegisterRule::scaled(0.01, 2, "Hz"),
            MR::RelayStatus => RegisterRule::label(RuleKind::RelayBits),
            MR::WorkingMode => RegisterRule::label(RuleKind::WorkingMode),
            MR::WorkingStatus => RegisterRule::label(RuleKind::WorkingStatus),
            MR::OvercurrentTripTime | MR::ReportingInterval => RegisterRule::raw("minutes"),
            MR::SignalStrength => RegisterRule::raw("%"),
            MR::SwitchOffTimer => RegisterRule {
                unit: "s",
                ..RegisterRule::label(RuleKind::SwitchOffTimer)
            },
        }
    }
}

/// Get the rule for a register number, falling back to [`RegisterRule::DEFAULT`].
pub fn rule_for(register: u16) -> RegisterRule {
    MeterRegister::from_repr(register)
        .map(|register| register.rule())
        .unwrap_or(RegisterRule::DEFAULT)
}

/// Get the rule for a textual register key such as `"124"`.
pub fn rule_for_key(key: &str) -> RegisterRule {
    MeterRegister::from_key(key)
        .map(|register| register.rule())
        .unwrap_or(RegisterRule::DEFAULT)
}

/// Big-endian value of `data`, as a float so any width fits.
pub fn be_value(data: &[u8]) -> f64 {
    data.iter().fold(0.0, |acc, &byte| acc * 256.0 + byte as f64)
}

/// A decoded register value, ready to be shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayValue {
    Quantity {
        value: f64,
        decimals: usize,
        unit: &'static str,
    },
    Relay(RelayStatus),
    Mode(WorkingMode),
    Status(WorkingStatus),
    /// Switch-off timer. `0` seconds means the meter is on.
    Timer { seconds: u64 },
}

impl DisplayValue {
    /// The numeric value, if this is a quantity.
    pub fn value(&self) -> Option<f64> {
        match self {
            DisplayValue::Quantity { value, .. } => Some(*value),
            DisplayValue::Timer { seconds } => Some(*seconds as f64),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Quantity {
                value,
                decimals,
                unit,
            } => {
                let decimals = *decimals;
                write!(f, "{value:.decimals$}")?;
                if !unit.is_empty() {
                    write!(f, " {unit}")?;
                }
                Ok(())
            }
            DisplayValue::Relay(status) => fmt::Display::fmt(status, f),
            DisplayValue::Mode(mode) => fmt::Display::fmt(mode, f),
            DisplayValue::Status(status) => fmt::Display::fmt(status, f),
            DisplayValue::Timer { seconds: 0 } => f.write_str("On, no switch-off timer active"),
            DisplayValue::Timer { seconds } => write!(f, "Off, {seconds} s remaining"),
        }
    }
}
