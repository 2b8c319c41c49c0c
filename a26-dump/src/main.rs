// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! a26-dump
//!
//! Reads Atari 2600 cartridges using MCP23017/MCP23008 GPIO expanders on a
//! Linux I2C bus (e.g. a Raspberry Pi).
//!
//! Subcommands:
//! - `dump` - read the whole ROM to a file, handling F8/F6 bank switching
//! - `peek` - print raw bytes from a range of addresses
//! - `walk` - step a single high bit across the address lines, to check
//!   wiring

mod args;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use linux_embedded_hal::{Delay, I2cdev};
use simple_logger::SimpleLogger;
use std::io::{self, Write};

use a26_common::{DumpError, I2cBus, RomScanner, ScanConfig, ValidationFault};

use args::{BusArgs, Cli, Commands, DumpArgs, PeekArgs, WalkArgs};
use output::FileSink;

fn main() -> Result<()> {
    let cli = Cli::parse();

    SimpleLogger::new()
        .with_level(cli.log_level)
        .init()
        .context("Failed to initialise logging")?;

    match cli.command {
        Commands::Dump(args) => dump(args),
        Commands::Peek(args) => peek(args),
        Commands::Walk(args) => walk(args),
    }
}

fn open_scanner(
    bus: &BusArgs,
    config: ScanConfig,
) -> Result<RomScanner<I2cBus<I2cdev>, Delay>> {
    let device = bus.device();
    let i2c = I2cdev::new(&device)
        .with_context(|| format!("Failed to open I2C bus {}", device))?;
    log::info!("Opened I2C bus {}", device);
    Ok(RomScanner::new(I2cBus::new(i2c), Delay, config))
}

fn dump(args: DumpArgs) -> Result<()> {
    let config = args.scan_config()?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Check the output before spending minutes reading the cartridge
    let mut sink = FileSink::new(args.output.clone(), args.overwrite);
    sink.check()?;

    let mut scanner = open_scanner(&args.bus, config)?;
    scanner
        .dump(&mut sink, |done, total| {
            print!("\r- Read {} of {} bytes", done, total);
            io::stdout().flush().ok();
        })
        .map_err(|e| {
            println!();
            if let DumpError::Validation(fault) = &e {
                println!("{}", validation_hint(fault));
            }
            e
        })
        .with_context(|| format!("Failed to read cartridge via {}", args.bus.device()))?;

    println!();
    println!(
        "Successfully read {} bytes to `{}`",
        scanner.config().rom_size,
        args.output.display()
    );

    Ok(())
}

fn validation_hint(fault: &ValidationFault) -> &'static str {
    if fault.is_absent() {
        "Check the cartridge is inserted and seated properly"
    } else {
        "Check the expander wiring, `a26-dump walk` can help trace the address lines"
    }
}

fn peek(args: PeekArgs) -> Result<()> {
    let config = args.bus.scan_config(args.count)?;
    let mut scanner = open_scanner(&args.bus, config)?;

    let bytes = scanner
        .peek(args.offset, args.count)
        .with_context(|| format!("Failed to read from 0x{:04x}", args.offset))?;

    for byte in bytes {
        println!("{:02x}", byte);
    }

    Ok(())
}

fn walk(args: WalkArgs) -> Result<()> {
    let config = args.bus.scan_config(0)?;
    let mut scanner = open_scanner(&args.bus, config)?;
    let hold = args.hold;

    scanner
        .walk_address_lines(hold, |line| {
            println!("- A{} high, holding for {:?}", line, hold);
        })
        .context("Failed to drive address lines")?;

    println!("All address lines walked");
    Ok(())
}
