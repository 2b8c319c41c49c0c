// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Error types returned by the reader core.

use thiserror::Error;

/// Reasons the pre-flight ROM check can reject a cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFault {
    #[error("all zeros returned, is the cartridge inserted?")]
    NotInserted,

    #[error("all 0xFF returned, wiring issue?")]
    AllOnes,

    #[error("duplicate bytes returned, wiring issue?")]
    DuplicatePairs,
}

impl ValidationFault {
    /// True if the cartridge appears to be missing rather than miswired.
    pub fn is_absent(&self) -> bool {
        matches!(self, ValidationFault::NotInserted)
    }
}

/// Inconsistent configuration, detected before any bus activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ROM size must be non-zero")]
    ZeroRomSize,

    #[error("ROM size {size} bytes exceeds the maximum of {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("ROM size {size} bytes needs {banks} banks but {method} supports {supported}")]
    TooManyBanks {
        size: usize,
        banks: usize,
        method: String,
        supported: usize,
    },

    #[error("I2C address 0x{0:02x} is outside the 7-bit range")]
    InvalidI2cAddress(u8),

    #[error("{first} and {second} ports are both wired to {port}")]
    PortConflict {
        first: &'static str,
        second: &'static str,
        port: String,
    },

    #[error("{count} bytes from 0x{start:04x} runs past the end of the 13-bit address space")]
    AddressRange { start: u16, count: usize },

    #[error("stabilising reads need a sample limit of at least {min}, got {limit}")]
    SampleLimitTooLow { limit: usize, min: usize },
}

/// Everything that can abort a scan.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I2C {op} failed on chip 0x{chip:02x} register 0x{register:02x}: {reason}")]
    Transport {
        op: &'static str,
        chip: u8,
        register: u8,
        reason: String,
    },

    #[error("I2C read from chip 0x{chip:02x} register 0x{register:02x} failed after {attempts} attempts: {reason}")]
    TransportExhausted {
        chip: u8,
        register: u8,
        attempts: u32,
        reason: String,
    },

    #[error("ROM check failed: {0}")]
    Validation(#[from] ValidationFault),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("data bus at address 0x{address:04x} did not settle after {samples} samples")]
    StabilizationTimeout { address: u16, samples: usize },

    #[error("failed to write ROM image: {0}")]
    Output(#[from] std::io::Error),
}

impl DumpError {
    /// True for faults caused by the bus transport itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DumpError::Transport { .. } | DumpError::TransportExhausted { .. }
        )
    }
}
