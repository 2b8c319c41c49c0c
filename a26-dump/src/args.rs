// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use a26_common::config::{DEFAULT_MAX_SAMPLES, parse_int};
use a26_common::{BankSwitchChoice, ExpanderBank, ExpanderPort, ScanConfig, Wiring, load_wiring};

#[derive(Parser)]
#[command(name = "a26-dump")]
#[command(about = "Read an Atari 2600 cartridge via I2C")]
#[command(version)]
#[command(after_help = "Use 'help <subcommand>' for detailed options (e.g., 'help dump')")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = parse_log_level)]
    pub log_level: LevelFilter,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reads the whole cartridge ROM to a file.
    ///
    /// Checks the first 16 bytes for signs of a missing cartridge or wiring
    /// problems first, and only creates the output file once every byte has
    /// been read.
    Dump(DumpArgs),

    /// Reads bytes from raw cartridge addresses and outputs them on the
    /// console, for debugging.  No bank switching or ROM checks are done.
    Peek(PeekArgs),

    /// Drives each address line high in turn, from A0 to A12, so the
    /// address wiring can be checked with a meter or logic probe.
    Walk(WalkArgs),
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// ROM size in KB (2, 4, 8, 16)
    #[arg(short = 's', long = "size", value_parser = parse_rom_size)]
    pub rom_size: usize,

    /// ROM output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// ROM bank switching method (auto, F8, F6)
    #[arg(short = 'b', long = "bank", default_value = "auto", value_parser = parse_bank_switch)]
    pub bank_switch: BankSwitchChoice,

    /// Read each byte once, rather than until 10 identical reads in a row
    #[arg(long)]
    pub no_stabilize: bool,

    /// Give up on a byte after this many reads without it settling
    #[arg(long, default_value_t = DEFAULT_MAX_SAMPLES)]
    pub max_samples: usize,

    /// Overwrite an existing output file
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct PeekArgs {
    /// Number of bytes to read
    #[arg(short = 'n', long = "num-bytes")]
    pub count: usize,

    /// Address to start reading from (hex or int)
    #[arg(short = 'o', long = "offset", default_value = "0x00", value_parser = parse_address)]
    pub offset: u16,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct WalkArgs {
    /// Seconds to hold each address line high
    #[arg(long, default_value = "30", value_parser = parse_secs)]
    pub hold: Duration,

    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct BusArgs {
    /// The I2C bus to use (0=/dev/i2c-0, 1=/dev/i2c-1)
    #[arg(long, default_value_t = 1)]
    pub i2c_bus: u8,

    /// JSON wiring profile, instead of the --write-*/--read-* options
    #[arg(long, conflicts_with_all = [
        "write_bus1", "write_bank1", "write_bus2", "write_bank2", "read_bus", "read_bank"
    ])]
    pub wiring: Option<PathBuf>,

    /// The I2C bus address used to write the first 8 bits of the ROM address (hex or int)
    #[arg(long, default_value = "0x20", value_parser = parse_i2c_addr)]
    pub write_bus1: u8,

    /// The bank used to write the first 8 bits of the ROM address
    /// (0=MCP23017 Bank A, 1=MCP23017 Bank B, 2=MCP23008)
    #[arg(long, default_value = "0", value_parser = parse_expander_bank, verbatim_doc_comment)]
    pub write_bank1: ExpanderBank,

    /// The I2C bus address used to write the last 5 bits of the ROM address (hex or int)
    #[arg(long, default_value = "0x20", value_parser = parse_i2c_addr)]
    pub write_bus2: u8,

    /// The bank used to write the last 5 bits of the ROM address
    /// (0=MCP23017 Bank A, 1=MCP23017 Bank B, 2=MCP23008)
    #[arg(long, default_value = "1", value_parser = parse_expander_bank, verbatim_doc_comment)]
    pub write_bank2: ExpanderBank,

    /// The I2C bus address used to read the ROM data (hex or int)
    #[arg(long, default_value = "0x24", value_parser = parse_i2c_addr)]
    pub read_bus: u8,

    /// The bank used to read the ROM data
    /// (0=MCP23017 Bank A, 1=MCP23017 Bank B, 2=MCP23008)
    #[arg(long, default_value = "0", value_parser = parse_expander_bank, verbatim_doc_comment)]
    pub read_bank: ExpanderBank,

    /// Delay in seconds between setting the address and reading a byte
    #[arg(long, default_value = "0.2", value_parser = parse_secs)]
    pub rom_delay: Duration,

    /// Number of retries when an I/O error is received during reading
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Seconds to wait before each retry (0 retries immediately)
    #[arg(long, default_value = "5", value_parser = parse_secs)]
    pub retry_delay: Duration,
}

impl BusArgs {
    pub fn device(&self) -> String {
        format!("/dev/i2c-{}", self.i2c_bus)
    }

    pub fn wiring(&self) -> Result<Wiring> {
        if let Some(path) = &self.wiring {
            return load_wiring(path);
        }

        let wiring = Wiring {
            write_low: ExpanderPort::new(self.write_bus1, self.write_bank1),
            write_high: ExpanderPort::new(self.write_bus2, self.write_bank2),
            read: ExpanderPort::new(self.read_bus, self.read_bank),
        };
        wiring.validate()?;
        Ok(wiring)
    }

    /// Builds the configuration for a scan of `rom_size` bytes.  Not yet
    /// validated against the ROM size.
    pub fn scan_config(&self, rom_size: usize) -> Result<ScanConfig> {
        let wiring = self.wiring().context("Invalid wiring")?;

        let mut config = ScanConfig::new(rom_size, wiring);
        config.rom_delay = self.rom_delay;
        config.retry_delay = self.retry_delay;
        config.max_retries = self.retries;
        Ok(config)
    }
}

impl DumpArgs {
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = self.bus.scan_config(self.rom_size)?;
        config.bank_switch = self.bank_switch;
        config.stabilize = !self.no_stabilize;
        config.max_samples = self.max_samples;
        Ok(config)
    }
}

fn parse_log_level(s: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(s).map_err(|_| {
        format!(
            "Invalid log level: {}. Valid values are: off, error, warn, info, debug, trace",
            s
        )
    })
}

fn parse_rom_size(s: &str) -> Result<usize, String> {
    match s {
        "2" | "4" | "8" | "16" => Ok(s.parse::<usize>().map_err(|e| e.to_string())? * 1024),
        _ => Err(format!(
            "Invalid ROM size: {}. Valid values are: 2, 4, 8, 16 (KB)",
            s
        )),
    }
}

fn parse_bank_switch(s: &str) -> Result<BankSwitchChoice, String> {
    BankSwitchChoice::from_str(s).ok_or_else(|| {
        format!(
            "Invalid bank switching method: {}. Valid values are: auto, F8, F6",
            s
        )
    })
}

fn parse_expander_bank(s: &str) -> Result<ExpanderBank, String> {
    ExpanderBank::from_str(s).ok_or_else(|| {
        format!(
            "Invalid bank: {}. Valid values are: 0 (MCP23017 Bank A), 1 (MCP23017 Bank B), 2 (MCP23008)",
            s
        )
    })
}

fn parse_i2c_addr(s: &str) -> Result<u8, String> {
    parse_int(s)
        .filter(|addr| *addr <= 0x7F)
        .map(|addr| addr as u8)
        .ok_or_else(|| format!("Invalid I2C address: {}. Must be 0x00-0x7f", s))
}

fn parse_address(s: &str) -> Result<u16, String> {
    parse_int(s)
        .filter(|addr| *addr <= 0x1FFF)
        .map(|addr| addr as u16)
        .ok_or_else(|| format!("Invalid address: {}. Must be 0x0000-0x1fff", s))
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("Invalid number of seconds: {}", s))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("Invalid number of seconds: {}", s))
}
