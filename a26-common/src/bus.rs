// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Register level access to the GPIO expanders.
//!
//! The reader only ever needs two primitives - write one register, read one
//! register - so that is all [`RegisterBus`] exposes.  [`I2cBus`] provides
//! them on top of any `embedded-hal` I2C implementation, and tests provide
//! them from a simulated cartridge.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::DumpError;

/// Single register byte access against a chip on the bus.
pub trait RegisterBus {
    type Error: Debug;

    fn write_register(&mut self, chip: u8, register: u8, value: u8) -> Result<(), Self::Error>;

    fn read_register(&mut self, chip: u8, register: u8) -> Result<u8, Self::Error>;
}

/// Adapts an `embedded-hal` I2C bus to [`RegisterBus`].
pub struct I2cBus<T> {
    i2c: T,
}

impl<T: I2c> I2cBus<T> {
    pub fn new(i2c: T) -> Self {
        Self { i2c }
    }
}

impl<T: I2c> RegisterBus for I2cBus<T> {
    type Error = T::Error;

    fn write_register(&mut self, chip: u8, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(chip, &[register, value])
    }

    fn read_register(&mut self, chip: u8, register: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(chip, &[register], &mut buf)?;
        Ok(buf[0])
    }
}

/// The bus handle plus the delay provider used to pace it.  Owned by exactly
/// one scan at a time.
pub struct Link<B, D> {
    bus: B,
    delay: D,
}

impl<B: RegisterBus, D: DelayNs> Link<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self { bus, delay }
    }

    /// Hands back the bus and delay provider.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    pub fn write(&mut self, chip: u8, register: u8, value: u8) -> Result<(), DumpError> {
        self.bus
            .write_register(chip, register, value)
            .map_err(|e| DumpError::Transport {
                op: "write",
                chip,
                register,
                reason: format!("{:?}", e),
            })
    }

    /// A single read attempt.  The raw bus error is returned so callers can
    /// decide whether to retry.
    pub fn try_read(&mut self, chip: u8, register: u8) -> Result<u8, B::Error> {
        self.bus.read_register(chip, register)
    }

    /// Waits for the full duration, in chunks `delay_us` can represent.
    pub fn pause(&mut self, duration: Duration) {
        let mut remaining = duration.as_micros();
        while remaining > 0 {
            let chunk = u32::try_from(remaining).unwrap_or(u32::MAX);
            self.delay.delay_us(chunk);
            remaining -= u128::from(chunk);
        }
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    #[cfg(test)]
    pub(crate) fn delay(&self) -> &D {
        &self.delay
    }
}
