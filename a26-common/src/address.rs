// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Maps logical ROM offsets onto the cartridge's address pins and drives
//! those pins via the two write ports.

use embedded_hal::delay::DelayNs;
use static_assertions::const_assert;
use std::time::Duration;

use crate::bus::{Link, RegisterBus};
use crate::error::DumpError;
use crate::mcp23x::ExpanderPort;

/// Where the cartridge's ROM appears in the 2600's address space (A12 high).
pub const ROM_OFFSET: u16 = 0x1000;

/// Size of the window through which a single bank is visible.
pub const BANK_WINDOW: usize = 4096;

/// Mask of the 13 address pins on the cartridge connector.
pub const ADDR_MASK: u16 = 0x1FFF;

// The whole bank window must be reachable on the 13 address pins
const_assert!(ROM_OFFSET as usize + BANK_WINDOW - 1 <= ADDR_MASK as usize);

/// Physical address asserted for `address` (a logical offset plus
/// [`ROM_OFFSET`]).  Wraps every [`BANK_WINDOW`] bytes.
pub fn real_address(address: usize) -> u16 {
    let offset = address - ROM_OFFSET as usize;
    ((offset % BANK_WINDOW) as u16) + ROM_OFFSET
}

/// Which 4KB bank `address` (a logical offset plus [`ROM_OFFSET`]) falls in.
pub fn bank_number(address: usize) -> usize {
    (address - ROM_OFFSET as usize) / BANK_WINDOW
}

/// Splits a 13-bit address across two 8-bit expander ports.
#[derive(Debug, Clone)]
pub struct AddressEncoder {
    low: ExpanderPort,
    high: ExpanderPort,
    settle: Duration,
}

impl AddressEncoder {
    pub fn new(low: ExpanderPort, high: ExpanderPort, settle: Duration) -> Self {
        Self { low, high, settle }
    }

    /// Values written to the low and high ports for `address`.
    pub fn split(address: u16) -> (u8, u8) {
        ((address & 0xFF) as u8, (address >> 8) as u8)
    }

    /// Drives `address` onto the address pins, then waits for the
    /// cartridge's decoder to settle.
    pub fn set_address<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
        address: u16,
    ) -> Result<(), DumpError> {
        let (low, high) = Self::split(address);
        link.write(self.low.addr, self.low.bank.gpio_reg(), low)?;
        link.write(self.high.addr, self.high.bank.gpio_reg(), high)?;
        link.pause(self.settle);
        Ok(())
    }
}
