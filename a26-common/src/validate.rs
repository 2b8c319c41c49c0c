// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Pre-flight checks, run before committing to a full (slow) dump.

use embedded_hal::delay::DelayNs;

use crate::address::{AddressEncoder, ROM_OFFSET};
use crate::bus::{Link, RegisterBus};
use crate::error::{DumpError, ValidationFault};
use crate::reader::ByteReader;

/// Number of bytes sampled from the start of the ROM.
pub const CHECK_SAMPLE_SIZE: usize = 16;

/// Checks a sample taken from the start of the ROM for the patterns seen
/// when no cartridge is inserted or the data lines are miswired.
pub fn check_sample(sample: &[u8]) -> Result<(), ValidationFault> {
    if sample.iter().all(|b| *b == 0x00) {
        return Err(ValidationFault::NotInserted);
    }

    if sample.iter().all(|b| *b == 0xFF) {
        return Err(ValidationFault::AllOnes);
    }

    // Two data lines shorted together read back as every byte matching its
    // neighbour
    if sample.chunks_exact(2).all(|pair| pair[0] == pair[1]) {
        return Err(ValidationFault::DuplicatePairs);
    }

    Ok(())
}

pub struct RomValidator<'a> {
    encoder: &'a AddressEncoder,
    reader: &'a ByteReader,
}

impl<'a> RomValidator<'a> {
    pub fn new(encoder: &'a AddressEncoder, reader: &'a ByteReader) -> Self {
        Self { encoder, reader }
    }

    /// Reads the first [`CHECK_SAMPLE_SIZE`] bytes of the ROM (with plain,
    /// non-stabilising reads).
    pub fn sample<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
    ) -> Result<Vec<u8>, DumpError> {
        let mut sample = Vec::with_capacity(CHECK_SAMPLE_SIZE);
        for x in 0..CHECK_SAMPLE_SIZE as u16 {
            self.encoder.set_address(link, ROM_OFFSET + x)?;
            sample.push(self.reader.read_byte(link)?);
        }
        Ok(sample)
    }

    pub fn check_rom<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
    ) -> Result<(), DumpError> {
        log::info!("Checking ROM...");
        let sample = self.sample(link)?;
        log::debug!("ROM sample: {:02x?}", sample);
        check_sample(&sample)?;
        log::info!("ROM checks passed");
        Ok(())
    }
}
