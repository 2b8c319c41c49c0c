// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Bank switch emulation.
//!
//! F8 and F6 cartridges switch the bank visible in the 4KB window when one
//! of their hotspot addresses is accessed.  A 2600 would hit these while
//! running code - we walk addresses in order instead, so have to assert the
//! right hotspot ourselves before reading:
//! - at the start of each bank window, to latch the bank being dumped
//! - straight after a hotspot has been read, as reading it will have
//!   latched a (possibly) different bank.

use embedded_hal::delay::DelayNs;

use crate::address::{AddressEncoder, ROM_OFFSET, bank_number, real_address};
use crate::bus::{Link, RegisterBus};
use crate::config::BankSwitchMethod;
use crate::error::DumpError;

#[derive(Debug, Clone, Copy)]
pub struct BankSwitchDetector {
    method: BankSwitchMethod,
}

impl BankSwitchDetector {
    pub fn new(method: BankSwitchMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> BankSwitchMethod {
        self.method
    }

    /// The hotspot to assert before reading `address` (a logical offset plus
    /// [`ROM_OFFSET`]), if any.
    pub fn hotspot_for(&self, address: usize) -> Option<u16> {
        let hotspots = self.method.hotspots();
        if hotspots.is_empty() {
            return None;
        }

        let real = real_address(address);
        let bank = bank_number(address);
        if real == ROM_OFFSET || hotspots.contains(&(real - 1)) {
            // Config validation guarantees the bank is in range
            hotspots.get(bank).copied()
        } else {
            None
        }
    }

    /// Asserts the hotspot needed before reading `address`, if there is one.
    /// Returns the hotspot asserted.
    pub fn bank_switch<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
        encoder: &AddressEncoder,
        address: usize,
    ) -> Result<Option<u16>, DumpError> {
        let hotspot = self.hotspot_for(address);
        if let Some(hotspot) = hotspot {
            log::debug!("Bank switch: 0x{:04x} via 0x{:04x}", address, hotspot);
            encoder.set_address(link, hotspot)?;
        }
        Ok(hotspot)
    }
}
