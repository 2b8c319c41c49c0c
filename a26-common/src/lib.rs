// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! a26-common
//!
//! Reads Atari 2600 cartridges through MCP23017/MCP23008 I2C GPIO expanders:
//! two expander ports drive the cartridge's 13 address lines and a third
//! samples its 8 data lines.
//!
//! The library handles:
//! - mapping ROM offsets onto the cartridge's 4KB address window
//! - F8 and F6 bank switch emulation
//! - retrying transport failures and riding out glitches on the data bus
//! - pre-flight checks for missing cartridges and wiring faults
//!
//! Typically used like this:
//!
//! ```rust ignore
//! use a26_common::{I2cBus, RomScanner, ScanConfig, Wiring};
//! let config = ScanConfig::new(8192, Wiring::default());
//! let mut scanner = RomScanner::new(I2cBus::new(i2c), delay, config);
//! let mut image = Vec::new();
//! scanner.dump(&mut image, |done, total| println!("{done}/{total}"))?;
//! ```

pub mod address;
pub mod bank;
pub mod bus;
pub mod config;
pub mod error;
pub mod mcp23x;
pub mod reader;
pub mod scanner;
pub mod validate;
pub mod wiring;

#[cfg(test)]
mod test_support;

pub use bus::{I2cBus, RegisterBus};
pub use config::{BankSwitchChoice, BankSwitchMethod, ScanConfig};
pub use error::{ConfigError, DumpError, ValidationFault};
pub use mcp23x::{ExpanderBank, ExpanderPort};
pub use scanner::{RomScanner, RomSink, ScanState};
pub use wiring::{Wiring, load_wiring};
