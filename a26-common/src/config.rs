// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Scan configuration.  Built once before the bus is touched, validated, and
//! then only ever borrowed.

use std::fmt;
use std::time::Duration;

use crate::address::BANK_WINDOW;
use crate::error::ConfigError;
use crate::wiring::Wiring;

/// Delay between setting an address and sampling the data bus.
pub const DEFAULT_ROM_DELAY: Duration = Duration::from_millis(200);

/// Fixed (not exponential) wait before retrying a failed read.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ceiling on samples taken by a stabilising read before giving up.
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Consecutive matching samples required after the first before a byte is
/// considered stable.
pub const STABLE_MATCHES: usize = 10;

/// Largest cartridge supported (F6, 4 x 4KB).
pub const MAX_ROM_SIZE: usize = 16 * 1024;

/// Parses an integer given in hex (`0x1000`, `$1000`) or decimal.
pub fn parse_int(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Bank switching scheme implemented by the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSwitchMethod {
    None,
    F8,
    F6,
}

impl BankSwitchMethod {
    /// Picks the scheme a cartridge of this size almost certainly uses.
    pub fn for_rom_size(rom_size: usize) -> Self {
        match rom_size {
            8192 => BankSwitchMethod::F8,
            16384 => BankSwitchMethod::F6,
            _ => BankSwitchMethod::None,
        }
    }

    /// Hotspot addresses, indexed by the bank they select.
    pub fn hotspots(&self) -> &'static [u16] {
        match self {
            BankSwitchMethod::None => &[],
            BankSwitchMethod::F8 => &[0x1FF8, 0x1FF9],
            BankSwitchMethod::F6 => &[0x1FF6, 0x1FF7, 0x1FF8, 0x1FF9],
        }
    }

    /// Number of 4KB banks reachable with this scheme.
    pub fn max_banks(&self) -> usize {
        self.hotspots().len().max(1)
    }
}

impl fmt::Display for BankSwitchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankSwitchMethod::None => write!(f, "none"),
            BankSwitchMethod::F8 => write!(f, "F8"),
            BankSwitchMethod::F6 => write!(f, "F6"),
        }
    }
}

/// Bank switching as requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSwitchChoice {
    Auto,
    F8,
    F6,
}

impl BankSwitchChoice {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(BankSwitchChoice::Auto),
            "f8" => Some(BankSwitchChoice::F8),
            "f6" => Some(BankSwitchChoice::F6),
            _ => None,
        }
    }

    pub fn resolve(&self, rom_size: usize) -> BankSwitchMethod {
        match self {
            BankSwitchChoice::Auto => BankSwitchMethod::for_rom_size(rom_size),
            BankSwitchChoice::F8 => BankSwitchMethod::F8,
            BankSwitchChoice::F6 => BankSwitchMethod::F6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub rom_size: usize,
    pub bank_switch: BankSwitchChoice,
    pub wiring: Wiring,
    pub rom_delay: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub stabilize: bool,
    pub max_samples: usize,
}

impl ScanConfig {
    pub fn new(rom_size: usize, wiring: Wiring) -> Self {
        Self {
            rom_size,
            bank_switch: BankSwitchChoice::Auto,
            wiring,
            rom_delay: DEFAULT_ROM_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            stabilize: true,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn bank_switch_method(&self) -> BankSwitchMethod {
        self.bank_switch.resolve(self.rom_size)
    }

    /// Number of 4KB banks this ROM spans.
    pub fn bank_count(&self) -> usize {
        self.rom_size.div_ceil(BANK_WINDOW)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rom_size == 0 {
            return Err(ConfigError::ZeroRomSize);
        }
        if self.rom_size > MAX_ROM_SIZE {
            return Err(ConfigError::RomTooLarge {
                size: self.rom_size,
                max: MAX_ROM_SIZE,
            });
        }

        let method = self.bank_switch_method();
        let banks = self.bank_count();
        if banks > method.max_banks() {
            return Err(ConfigError::TooManyBanks {
                size: self.rom_size,
                banks,
                method: method.to_string(),
                supported: method.max_banks(),
            });
        }

        if self.stabilize && self.max_samples <= STABLE_MATCHES {
            return Err(ConfigError::SampleLimitTooLow {
                limit: self.max_samples,
                min: STABLE_MATCHES + 1,
            });
        }

        self.wiring.validate()
    }
}
