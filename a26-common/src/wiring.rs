// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Which expander ports drive the cartridge's address lines and which one
//! samples its data lines.
//!
//! The 2600 cartridge has 13 address pins, so these are spread over two
//! ports: A0-A7 on the first, A8-A12 on the second.  The 8 data pins fit on a
//! single port.
//!
//! A wiring can also be loaded from a JSON profile, for example:
//!
//! ```json
//! {
//!     "description": "Pi hat, MCP23017 on 0x20, MCP23008 on 0x24",
//!     "write_low": { "addr": "0x20", "bank": 0 },
//!     "write_high": { "addr": "0x20", "bank": 1 },
//!     "read": { "addr": "0x24", "bank": 2 }
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::mcp23x::{ExpanderBank, ExpanderPort};

// Highest valid 7-bit I2C address
const MAX_I2C_ADDR: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Wiring {
    /// Address lines A0-A7.
    pub write_low: ExpanderPort,

    /// Address lines A8-A12.
    pub write_high: ExpanderPort,

    /// Data lines D0-D7.
    pub read: ExpanderPort,
}

impl Default for Wiring {
    fn default() -> Self {
        Self {
            write_low: ExpanderPort::new(0x20, ExpanderBank::Mcp23017A),
            write_high: ExpanderPort::new(0x20, ExpanderBank::Mcp23017B),
            read: ExpanderPort::new(0x24, ExpanderBank::Mcp23017A),
        }
    }
}

impl Wiring {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for port in [self.write_low, self.write_high, self.read] {
            if port.addr > MAX_I2C_ADDR {
                return Err(ConfigError::InvalidI2cAddress(port.addr));
            }
        }

        let ports = [
            ("write-low", self.write_low),
            ("write-high", self.write_high),
            ("read", self.read),
        ];
        for (ii, &(first, a)) in ports.iter().enumerate() {
            for &(second, b) in ports.iter().skip(ii + 1) {
                if a == b {
                    return Err(ConfigError::PortConflict {
                        first,
                        second,
                        port: a.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WiringProfile {
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    wiring: Wiring,
}

/// Loads and validates a JSON wiring profile.
pub fn load_wiring<P: AsRef<Path>>(path: P) -> Result<Wiring> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read wiring profile: {}", path.display()))?;
    let profile = parse_wiring(&content)
        .with_context(|| format!("Failed to parse wiring profile: {}", path.display()))?;
    Ok(profile)
}

fn parse_wiring(content: &str) -> Result<Wiring> {
    let profile: WiringProfile = serde_json::from_str(content)?;
    if let Some(description) = &profile.description {
        log::info!("Using wiring profile: {}", description);
    }
    profile.wiring.validate()?;
    Ok(profile.wiring)
}
