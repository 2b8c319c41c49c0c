// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Sampling the cartridge's data lines.

use embedded_hal::delay::DelayNs;
use std::time::Duration;

use crate::bus::{Link, RegisterBus};
use crate::config::{STABLE_MATCHES, ScanConfig};
use crate::error::DumpError;
use crate::mcp23x::ExpanderPort;

/// Reads the data port, retrying transport failures a bounded number of
/// times with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct ByteReader {
    port: ExpanderPort,
    max_retries: u32,
    retry_delay: Duration,
}

impl ByteReader {
    pub fn new(port: ExpanderPort, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            port,
            max_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.wiring.read, config.max_retries, config.retry_delay)
    }

    pub fn read_byte<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
    ) -> Result<u8, DumpError> {
        let chip = self.port.addr;
        let register = self.port.bank.gpio_reg();

        let mut retry = 0;
        loop {
            match link.try_read(chip, register) {
                Ok(byte) => return Ok(byte),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    log::warn!(
                        "Read from 0x{:02x} failed ({:?}), retry {} of {} in {:?}",
                        chip,
                        e,
                        retry,
                        self.max_retries,
                        self.retry_delay
                    );
                    link.pause(self.retry_delay);
                }
                Err(e) => {
                    return Err(DumpError::TransportExhausted {
                        chip,
                        register,
                        attempts: retry + 1,
                        reason: format!("{:?}", e),
                    });
                }
            }
        }
    }
}

/// Re-samples the data port until the same value has been seen
/// [`STABLE_MATCHES`] more times in a row, to ride out contact bounce and
/// other glitches on old cartridge slots.
#[derive(Debug, Clone)]
pub struct StabilizingReader {
    reader: ByteReader,
    mismatch_delay: Duration,
    max_samples: usize,
}

impl StabilizingReader {
    pub fn new(reader: ByteReader, mismatch_delay: Duration, max_samples: usize) -> Self {
        Self {
            reader,
            mismatch_delay,
            max_samples,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            ByteReader::from_config(config),
            config.rom_delay,
            config.max_samples,
        )
    }

    /// `address` is only used to report a bus that never settles.
    pub fn read_byte_fast<B: RegisterBus, D: DelayNs>(
        &self,
        link: &mut Link<B, D>,
        address: u16,
    ) -> Result<u8, DumpError> {
        let mut last: Option<u8> = None;
        let mut matches = 0;

        for _ in 0..self.max_samples {
            let byte = self.reader.read_byte(link)?;

            match last {
                Some(prev) if prev == byte => {
                    matches += 1;
                    if matches >= STABLE_MATCHES {
                        return Ok(byte);
                    }
                }
                Some(prev) => {
                    log::debug!(
                        "Mismatch at 0x{:04x}: 0x{:02x} 0x{:02x}",
                        address,
                        prev,
                        byte
                    );
                    link.pause(self.mismatch_delay);
                    last = Some(byte);
                    matches = 0;
                }
                None => last = Some(byte),
            }
        }

        Err(DumpError::StabilizationTimeout {
            address,
            samples: self.max_samples,
        })
    }
}
