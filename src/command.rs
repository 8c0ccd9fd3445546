//! Write command definitions.
//!
//! A [`WriteCommand`] describes how a physical quantity entered by an operator becomes a
//! register value: `raw = round(quantity / step)`. The definitions can be loaded from the same
//! JSON shape as `write-commands.json`, and the commonly used ones are available as presets.

use fugit::Duration;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{Error, Result},
    frame::{CommandFrame, FrameBuilder, WRITE_MULTIPLE_REGISTERS, WRITE_SINGLE_REGISTER},
    register::MeterRegister,
};

/// Width and signedness of the written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "uint16")]
    U16,
    #[serde(rename = "int16")]
    I16,
    #[serde(rename = "uint32")]
    U32,
}

impl DataType {
    /// Inclusive range of raw register values.
    pub const fn raw_bounds(&self) -> (i64, i64) {
        match self {
            DataType::U16 => (0, u16::MAX as i64),
            DataType::I16 => (i16::MIN as i64, i16::MAX as i64),
            DataType::U32 => (0, u32::MAX as i64),
        }
    }
}

fn default_step() -> f64 {
    1.0
}

fn deserialize_fixed_value<'de, D>(deserializer: D) -> core::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FixedValue {
        Number(u16),
        Text(String),
    }

    match Option::<FixedValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FixedValue::Number(value)) => Ok(Some(value)),
        Some(FixedValue::Text(text)) => {
            let text = text.trim();
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            u16::from_str_radix(digits, 16)
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// Definition of a register write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCommand {
    pub name: String,
    pub register: u16,
    pub data_type: DataType,
    /// Size of one raw unit in the physical unit. E.g. `0.01` for a value in 0.01 A.
    #[serde(default = "default_step")]
    pub step: f64,
    /// Smallest accepted quantity, in the physical unit.
    #[serde(default)]
    pub min: Option<f64>,
    /// Largest accepted quantity, in the physical unit.
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub unit: String,
    /// Fixed raw value for commands that take no input, such as a restart.
    ///
    /// Accepts a number or a hex string such as `"0x0001"`.
    #[serde(
        default,
        rename = "specialValue",
        deserialize_with = "deserialize_fixed_value"
    )]
    pub fixed_value: Option<u16>,
}

impl WriteCommand {
    /// Recharge prepaid energy. Quantity in kWh.
    pub fn energy_recharge() -> Self {
        Self {
            name: "Energy recharge".into(),
            register: MeterRegister::EnergyRecharge.into(),
            data_type: DataType::U16,
            step: 0.01,
            min: Some(0.01),
            max: Some(655.35),
            unit: "kWh".into(),
            fixed_value: None,
        }
    }

    /// Set the overcurrent threshold. Quantity in A.
    pub fn overcurrent_threshold() -> Self {
        Self {
            name: "Overcurrent threshold".into(),
            register: MeterRegister::OvercurrentThreshold.into(),
            data_type: DataType::U16,
            step: 0.01,
            min: Some(0.01),
            max: Some(655.35),
            unit: "A".into(),
            fixed_value: None,
        }
    }

    /// Switch the meter off for a while. Quantity in seconds.
    pub fn switch_off_timer() -> Self {
        Self {
            name: "Switch-off timer".into(),
            register: MeterRegister::SwitchOffTimer.into(),
            data_type: DataType::U32,
            step: 1.0,
            min: Some(1.0),
            max: None,
            unit: "s".into(),
            fixed_value: None,
        }
    }

    pub const fn function_code(&self) -> u8 {
        match self.data_type {
            DataType::U32 => WRITE_MULTIPLE_REGISTERS,
            DataType::U16 | DataType::I16 => WRITE_SINGLE_REGISTER,
        }
    }

    /// Convert a quantity to its raw register value, checking it against the bounds.
    pub fn raw_value(&self, quantity: f64) -> Result<i64> {
        let (raw_min, raw_max) = self.data_type.raw_bounds();
        let min = self.min.unwrap_or(raw_min as f64 * self.step);
        let max = self.max.unwrap_or(raw_max as f64 * self.step);
        if !quantity.is_finite() || quantity < min || quantity > max {
            return Err(Error::InvalidRange {
                value: quantity,
                min,
                max,
            });
        }

        let raw = (quantity / self.step).round() as i64;
        if raw < raw_min || raw > raw_max {
            return Err(Error::InvalidRange {
                value: quantity,
                min: raw_min as f64 * self.step,
                max: raw_max as f64 * self.step,
            });
        }
        Ok(raw)
    }

    /// Build the frame writing `quantity` to this command's register.
    pub fn build(&self, builder: &FrameBuilder, quantity: f64) -> Result<CommandFrame> {
        let raw = self.raw_value(quantity)?;
        match self.data_type {
            // Wraps negative values into two's complement.
            DataType::U16 | DataType::I16 => {
                builder.write_single_register(self.register, raw.rem_euclid(0x1_0000) as u16)
            }
            DataType::U32 => builder.write_multiple_registers(self.register, raw as u32),
        }
    }

    /// Build the frame for a command that writes a fixed value.
    pub fn build_fixed(&self, builder: &FrameBuilder) -> Result<CommandFrame> {
        let value = self.fixed_value.ok_or(Error::MissingValue)?;
        builder.write_single_register(self.register, value)
    }
}

/// Build the frame which switches the meter off for `duration`, rounded down to whole seconds.
pub fn switch_off_for(builder: &FrameBuilder, duration: Duration<u32, 1, 1>) -> Result<CommandFrame> {
    WriteCommand::switch_off_timer().build(builder, duration.to_secs() as f64)
}

/// Parse a JSON object of write commands keyed by name.
pub fn parse_write_commands(json: &str) -> Result<Vec<(String, WriteCommand)>> {
    let table: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    table
        .into_iter()
        .map(|(key, value)| -> Result<(String, WriteCommand)> {
            Ok((key, serde_json::from_value(value)?))
        })
        .collect()
}
