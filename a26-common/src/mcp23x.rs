// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MCP23017/MCP23008 register map.
//!
//! Taken from the datasheets:
//! - MCP23017: table 3-3 (IOCON.BANK = 0 addressing)
//! - MCP23008: table 1-3
//!
//! The MCP23017 exposes two 8-bit ports (A and B) with interleaved registers,
//! the MCP23008 a single 8-bit port.  Rather than modelling chips, we model
//! the 8-bit port being driven, which is all the reader cares about.

use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::config::parse_int;

/// IODIR value setting all 8 lines of a port to outputs.
pub const IODIR_ALL_OUTPUT: u8 = 0x00;

/// IODIR value setting all 8 lines of a port to inputs.
pub const IODIR_ALL_INPUT: u8 = 0xFF;

const REG_IODIR: [u8; 3] = [0x00, 0x01, 0x00];
const REG_GPIO: [u8; 3] = [0x12, 0x13, 0x09];

/// An 8-bit expander port.  The discriminant is the "bank index" used on the
/// command line and in wiring profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpanderBank {
    Mcp23017A = 0,
    Mcp23017B = 1,
    Mcp23008 = 2,
}

impl ExpanderBank {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(ExpanderBank::Mcp23017A),
            1 => Some(ExpanderBank::Mcp23017B),
            2 => Some(ExpanderBank::Mcp23008),
            _ => None,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "0" | "a" | "mcp23017a" => Some(ExpanderBank::Mcp23017A),
            "1" | "b" | "mcp23017b" => Some(ExpanderBank::Mcp23017B),
            "2" | "mcp23008" => Some(ExpanderBank::Mcp23008),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// I/O direction register for this port.
    pub fn iodir_reg(&self) -> u8 {
        REG_IODIR[self.index() as usize]
    }

    /// GPIO (logic level) register for this port.
    pub fn gpio_reg(&self) -> u8 {
        REG_GPIO[self.index() as usize]
    }
}

impl fmt::Display for ExpanderBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpanderBank::Mcp23017A => write!(f, "MCP23017 bank A"),
            ExpanderBank::Mcp23017B => write!(f, "MCP23017 bank B"),
            ExpanderBank::Mcp23008 => write!(f, "MCP23008"),
        }
    }
}

impl<'de> Deserialize<'de> for ExpanderBank {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bank, s) = match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(n) => (
                u8::try_from(n).ok().and_then(ExpanderBank::from_index),
                n.to_string(),
            ),
            NumOrStr::Str(s) => (ExpanderBank::from_str(&s), s),
        };
        bank.ok_or_else(|| {
            serde::de::Error::custom(format!(
                "Invalid expander bank: {}, must be 0 (MCP23017 A), 1 (MCP23017 B) or 2 (MCP23008)",
                s
            ))
        })
    }
}

// Wiring profiles may give numbers either as JSON integers or as strings, so
// that I2C addresses can be written in hex.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

fn deserialize_i2c_addr<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Some(n),
        NumOrStr::Str(s) => parse_int(&s).map(u64::from),
    };
    value
        .and_then(|v| u8::try_from(v).ok())
        .filter(|v| *v <= 0x7F)
        .ok_or_else(|| serde::de::Error::custom("Invalid I2C address, must be 0x00-0x7f"))
}

/// A single 8-bit port on a chip at a given I2C address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct ExpanderPort {
    #[serde(deserialize_with = "deserialize_i2c_addr")]
    pub addr: u8,
    pub bank: ExpanderBank,
}

impl ExpanderPort {
    pub const fn new(addr: u8, bank: ExpanderBank) -> Self {
        Self { addr, bank }
    }
}

impl fmt::Display for ExpanderPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}/{}", self.addr, self.bank)
    }
}
