// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Drives a complete dump: configure the expanders, sanity check the
//! cartridge, walk every ROM offset in order and hand the finished image to
//! the output.

use embedded_hal::delay::DelayNs;
use std::io;
use std::time::Duration;

use crate::address::{ADDR_MASK, AddressEncoder, ROM_OFFSET, real_address};
use crate::bank::BankSwitchDetector;
use crate::bus::{Link, RegisterBus};
use crate::config::ScanConfig;
use crate::error::{ConfigError, DumpError};
use crate::mcp23x::{ExpanderPort, IODIR_ALL_INPUT, IODIR_ALL_OUTPUT};
use crate::reader::{ByteReader, StabilizingReader};
use crate::validate::RomValidator;

/// Number of address pins on the cartridge connector.
pub const ADDRESS_LINES: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Configuring,
    Validating,
    Scanning,
    Finalized,
    Aborted,
}

/// Receives the ROM image once it has been completely read.
pub trait RomSink {
    fn finalize(&mut self, image: &[u8]) -> io::Result<()>;
}

impl RomSink for Vec<u8> {
    fn finalize(&mut self, image: &[u8]) -> io::Result<()> {
        self.extend_from_slice(image);
        Ok(())
    }
}

pub struct RomScanner<B, D> {
    link: Link<B, D>,
    config: ScanConfig,
    encoder: AddressEncoder,
    reader: ByteReader,
    stabilizer: StabilizingReader,
    detector: BankSwitchDetector,
    state: ScanState,
}

impl<B: RegisterBus, D: DelayNs> RomScanner<B, D> {
    /// Takes ownership of the bus for the lifetime of the scanner.
    pub fn new(bus: B, delay: D, config: ScanConfig) -> Self {
        let encoder = AddressEncoder::new(
            config.wiring.write_low,
            config.wiring.write_high,
            config.rom_delay,
        );
        let reader = ByteReader::from_config(&config);
        let stabilizer = StabilizingReader::from_config(&config);
        let detector = BankSwitchDetector::new(config.bank_switch_method());

        Self {
            link: Link::new(bus, delay),
            config,
            encoder,
            reader,
            stabilizer,
            detector,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Gives the bus back.
    pub fn release(self) -> (B, D) {
        self.link.release()
    }

    /// Dumps the whole ROM, calling `progress` with (bytes read, total) after
    /// each byte.  `sink` is only handed the image if every byte was read.
    pub fn dump<S: RomSink>(
        &mut self,
        sink: &mut S,
        progress: impl FnMut(usize, usize),
    ) -> Result<(), DumpError> {
        let result = self.run(sink, progress);
        if let Err(e) = &result {
            log::error!("Scan aborted in state {:?}: {}", self.state, e);
            self.state = ScanState::Aborted;
        }
        result
    }

    fn run<S: RomSink>(
        &mut self,
        sink: &mut S,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<(), DumpError> {
        self.config.validate()?;

        self.state = ScanState::Configuring;
        self.configure_ports()?;

        self.state = ScanState::Validating;
        RomValidator::new(&self.encoder, &self.reader).check_rom(&mut self.link)?;

        self.state = ScanState::Scanning;
        let rom_size = self.config.rom_size;
        log::info!(
            "Reading {} bytes, bank switching: {}",
            rom_size,
            self.detector.method()
        );

        let mut image = Vec::with_capacity(rom_size);
        for x in 0..rom_size {
            let address = x + ROM_OFFSET as usize;
            self.detector
                .bank_switch(&mut self.link, &self.encoder, address)?;

            let real = real_address(address);
            self.encoder.set_address(&mut self.link, real)?;

            let byte = if self.config.stabilize {
                self.stabilizer.read_byte_fast(&mut self.link, real)?
            } else {
                self.reader.read_byte(&mut self.link)?
            };
            image.push(byte);
            progress(x + 1, rom_size);
        }

        sink.finalize(&image)?;
        self.state = ScanState::Finalized;
        log::info!("Done!");

        Ok(())
    }

    /// Reads `count` bytes from raw address `start` onwards, one plain read
    /// each, without bank switching or validation.
    pub fn peek(&mut self, start: u16, count: usize) -> Result<Vec<u8>, DumpError> {
        if start as usize + count > ADDR_MASK as usize + 1 {
            return Err(ConfigError::AddressRange { start, count }.into());
        }
        self.config.wiring.validate()?;
        self.configure_ports()?;

        let mut bytes = Vec::with_capacity(count);
        for x in 0..count as u16 {
            self.encoder.set_address(&mut self.link, start + x)?;
            bytes.push(self.reader.read_byte(&mut self.link)?);
        }
        Ok(bytes)
    }

    /// Drives each address line high in turn, from A0 to A12, holding it for
    /// `hold`, so the wiring can be checked with a meter or logic probe.
    pub fn walk_address_lines(
        &mut self,
        hold: Duration,
        mut on_line: impl FnMut(u8),
    ) -> Result<(), DumpError> {
        self.config.wiring.validate()?;
        self.configure_ports()?;

        for line in 0..ADDRESS_LINES {
            self.encoder.set_address(&mut self.link, 1 << line)?;
            on_line(line);
            self.link.pause(hold);
        }
        Ok(())
    }

    fn configure_ports(&mut self) -> Result<(), DumpError> {
        let wiring = self.config.wiring;
        self.configure_port("writing", wiring.write_low, IODIR_ALL_OUTPUT)?;
        self.configure_port("writing", wiring.write_high, IODIR_ALL_OUTPUT)?;
        self.configure_port("reading", wiring.read, IODIR_ALL_INPUT)
    }

    fn configure_port(
        &mut self,
        purpose: &str,
        port: ExpanderPort,
        direction: u8,
    ) -> Result<(), DumpError> {
        log::info!(
            "Configuring bus 0x{:02x}, {} for {} (reg: 0x{:02x})",
            port.addr,
            port.bank,
            purpose,
            port.bank.iodir_reg()
        );
        self.link.write(port.addr, port.bank.iodir_reg(), direction)
    }

    #[cfg(test)]
    fn link(&self) -> &Link<B, D> {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BANK_WINDOW;
    use crate::config::{BankSwitchChoice, BankSwitchMethod};
    use crate::error::ValidationFault;
    use crate::test_support::{Cartridge, Event, RecordingDelay};
    use crate::wiring::Wiring;

    fn scanner(
        cart: Cartridge,
        rom_size: usize,
        bank_switch: BankSwitchChoice,
    ) -> RomScanner<Cartridge, RecordingDelay> {
        let mut config = ScanConfig::new(rom_size, Wiring::default());
        config.bank_switch = bank_switch;
        RomScanner::new(cart, RecordingDelay::default(), config)
    }

    // Distinct data per bank, except at the hotspots, where real cartridges
    // mirror the same bytes in every bank.
    fn banked_image(banks: usize) -> Vec<u8> {
        let mut image = Vec::with_capacity(banks * BANK_WINDOW);
        for bank in 0..banks {
            for offset in 0..BANK_WINDOW {
                if (0xFF6..=0xFF9).contains(&offset) {
                    image.push(0xE0 | offset as u8 & 0x0F);
                } else {
                    image.push((offset as u8).wrapping_add(bank as u8 * 0x40));
                }
            }
        }
        image
    }

    #[test]
    fn test_linear_dump() {
        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);
        let mut image = Vec::new();
        let mut reported = 0;

        scanner
            .dump(&mut image, |done, total| {
                assert_eq!(total, 4096);
                assert_eq!(done, reported + 1);
                reported = done;
            })
            .unwrap();

        assert_eq!(scanner.state(), ScanState::Finalized);
        assert_eq!(reported, 4096);
        assert_eq!(image.len(), 4096);
        for (ii, byte) in image.iter().enumerate() {
            assert_eq!(*byte as usize, ii % 256);
        }
    }

    #[test]
    fn test_ports_configured() {
        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 2048, BankSwitchChoice::Auto);
        scanner.dump(&mut Vec::new(), |_, _| {}).unwrap();

        let (cart, _) = scanner.release();
        assert_eq!(cart.register(0x20, 0x00), Some(0x00));
        assert_eq!(cart.register(0x20, 0x01), Some(0x00));
        assert_eq!(cart.register(0x24, 0x00), Some(0xFF));
        assert_eq!(
            &cart.writes()[..3],
            &[(0x20, 0x00, 0x00), (0x20, 0x01, 0x00), (0x24, 0x00, 0xFF)]
        );
    }

    #[test]
    fn test_bytes_read_in_address_order() {
        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 2048, BankSwitchChoice::Auto);
        scanner.dump(&mut Vec::new(), |_, _| {}).unwrap();

        // Skip the 16 validation reads
        let mut last = None;
        for event in scanner.link().bus().events().iter().skip(32) {
            if let Event::Read(address) = event {
                if let Some(last) = last {
                    assert!(*address >= last);
                }
                last = Some(*address);
            }
        }
        assert_eq!(last, Some(0x17FF));
    }

    #[test]
    fn test_f8_hotspots_precede_bank_reads() {
        let cart = Cartridge::banked(banked_image(2), BankSwitchMethod::F8);
        let mut scanner = scanner(cart, 8192, BankSwitchChoice::Auto);
        scanner.dump(&mut Vec::new(), |_, _| {}).unwrap();

        let addresses = scanner.link().bus().addresses();
        // 16 validation addresses, then the scan
        let scan = &addresses[16..];
        assert_eq!(&scan[..2], &[0x1FF8, 0x1000]);

        // Offset 4096 is the first time 0x1000 is asserted after 0x1FFF
        let pos = scan
            .windows(2)
            .position(|w| w == [0x1FFF, 0x1FF9])
            .unwrap();
        assert_eq!(scan[pos + 2], 0x1000);
    }

    #[test]
    fn test_f8_dump_matches_image() {
        let image = banked_image(2);
        let cart = Cartridge::banked(image.clone(), BankSwitchMethod::F8);
        let mut scanner = scanner(cart, 8192, BankSwitchChoice::Auto);
        let mut dumped = Vec::new();
        scanner.dump(&mut dumped, |_, _| {}).unwrap();
        assert_eq!(dumped, image);
    }

    #[test]
    fn test_f6_dump_matches_image() {
        let image = banked_image(4);
        let cart = Cartridge::banked(image.clone(), BankSwitchMethod::F6);
        let mut scanner = scanner(cart, 16384, BankSwitchChoice::Auto);
        let mut dumped = Vec::new();
        scanner.dump(&mut dumped, |_, _| {}).unwrap();
        assert_eq!(dumped, image);
    }

    #[test]
    fn test_plain_reads_when_not_stabilizing() {
        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 2048, BankSwitchChoice::Auto);
        scanner.config.stabilize = false;
        let mut image = Vec::new();
        scanner.dump(&mut image, |_, _| {}).unwrap();

        assert_eq!(image.len(), 2048);
        assert_eq!(scanner.link().bus().reads(), 16 + 2048);
    }

    #[test]
    fn test_validation_failure_aborts_before_scan() {
        let cart = Cartridge::from_fn(|_| 0);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);
        let mut image = Vec::new();
        let mut progressed = false;

        let err = scanner
            .dump(&mut image, |_, _| progressed = true)
            .unwrap_err();

        assert!(matches!(
            err,
            DumpError::Validation(ValidationFault::NotInserted)
        ));
        assert_eq!(scanner.state(), ScanState::Aborted);
        assert!(image.is_empty());
        assert!(!progressed);
        assert_eq!(scanner.link().bus().addresses().len(), 16);
    }

    #[test]
    fn test_bad_config_aborts_before_bus_activity() {
        let cart = Cartridge::from_fn(|a| a as u8);
        let mut scanner = scanner(cart, 16384, BankSwitchChoice::F8);

        let err = scanner.dump(&mut Vec::new(), |_, _| {}).unwrap_err();

        assert!(matches!(
            err,
            DumpError::Configuration(ConfigError::TooManyBanks { .. })
        ));
        assert_eq!(scanner.state(), ScanState::Aborted);
        assert!(scanner.link().bus().writes().is_empty());
    }

    #[test]
    fn test_exhausted_retries_abort_scan() {
        let mut cart = Cartridge::from_fn(|a| (a % 256) as u8);
        cart.fail_next_reads(4);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);
        let mut image = Vec::new();

        let err = scanner.dump(&mut image, |_, _| {}).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(scanner.state(), ScanState::Aborted);
        assert!(image.is_empty());
    }

    #[test]
    fn test_settle_delay_after_every_address() {
        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 2048, BankSwitchChoice::Auto);
        scanner.dump(&mut Vec::new(), |_, _| {}).unwrap();

        let link = scanner.link();
        let addresses = link.bus().addresses().len();
        assert_eq!(addresses, 16 + 2048);
        assert_eq!(
            link.delay().pauses(),
            vec![Duration::from_millis(200); addresses].as_slice()
        );
    }

    #[test]
    fn test_failing_sink() {
        struct BrokenSink;
        impl RomSink for BrokenSink {
            fn finalize(&mut self, _image: &[u8]) -> io::Result<()> {
                Err(io::Error::other("disk full"))
            }
        }

        let cart = Cartridge::from_fn(|a| (a % 256) as u8);
        let mut scanner = scanner(cart, 2048, BankSwitchChoice::Auto);
        let err = scanner.dump(&mut BrokenSink, |_, _| {}).unwrap_err();
        assert!(matches!(err, DumpError::Output(_)));
        assert_eq!(scanner.state(), ScanState::Aborted);
    }

    #[test]
    fn test_peek() {
        let cart = Cartridge::from_fn(|a| (a >> 4) as u8);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);

        let bytes = scanner.peek(0x0100, 4).unwrap();
        assert_eq!(bytes, vec![0x10; 4]);
        assert_eq!(
            scanner.link().bus().addresses(),
            vec![0x0100, 0x0101, 0x0102, 0x0103]
        );
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn test_peek_past_end() {
        let cart = Cartridge::from_fn(|a| a as u8);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);

        assert!(scanner.peek(0x1FFF, 1).is_ok());
        let err = scanner.peek(0x1FFF, 2).unwrap_err();
        assert!(matches!(
            err,
            DumpError::Configuration(ConfigError::AddressRange { .. })
        ));
    }

    #[test]
    fn test_walk_address_lines() {
        let cart = Cartridge::from_fn(|a| a as u8);
        let mut scanner = scanner(cart, 4096, BankSwitchChoice::Auto);
        let mut lines = Vec::new();

        scanner
            .walk_address_lines(Duration::from_secs(30), |line| lines.push(line))
            .unwrap();

        assert_eq!(lines, (0..ADDRESS_LINES).collect::<Vec<_>>());
        let expected: Vec<u16> = (0..ADDRESS_LINES).map(|l| 1 << l).collect();
        assert_eq!(scanner.link().bus().addresses(), expected);
        assert_eq!(
            scanner.link().delay().total(),
            Duration::from_millis(30_200) * ADDRESS_LINES as u32
        );
    }
}
