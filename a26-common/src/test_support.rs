// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! A simulated cartridge sitting behind the expanders, used by unit tests.

use embedded_hal::delay::DelayNs;
use std::collections::VecDeque;
use std::time::Duration;

use crate::address::{ADDR_MASK, BANK_WINDOW};
use crate::bus::{Link, RegisterBus};
use crate::config::BankSwitchMethod;
use crate::wiring::Wiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFault;

/// Bus activity as seen by the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SetAddress(u16),
    Read(u16),
}

type DataFn = Box<dyn Fn(usize, u16) -> u8>;

pub struct Cartridge {
    wiring: Wiring,
    data: DataFn,
    method: BankSwitchMethod,
    bank: usize,
    low: u8,
    high: u8,
    writes: Vec<(u8, u8, u8)>,
    events: Vec<Event>,
    failing_reads: usize,
    fail_writes: bool,
    glitches: VecDeque<Option<u8>>,
    noisy: bool,
    reads: usize,
}

impl Cartridge {
    /// Byte at physical address `address` is `f(address)`.
    pub fn from_fn(f: impl Fn(u16) -> u8 + 'static) -> Self {
        Self::new(Box::new(move |_, address| f(address)), BankSwitchMethod::None)
    }

    /// A single bank image, mirrored every `image.len()` bytes.
    pub fn linear(image: Vec<u8>) -> Self {
        Self::new(
            Box::new(move |_, address| {
                image[(address as usize & (BANK_WINDOW - 1)) % image.len()]
            }),
            BankSwitchMethod::None,
        )
    }

    /// A multi-bank image whose visible bank is latched by asserting one of
    /// `method`'s hotspot addresses.
    pub fn banked(image: Vec<u8>, method: BankSwitchMethod) -> Self {
        Self::new(
            Box::new(move |bank, address| {
                image[bank * BANK_WINDOW + (address as usize & (BANK_WINDOW - 1))]
            }),
            method,
        )
    }

    fn new(data: DataFn, method: BankSwitchMethod) -> Self {
        Self {
            wiring: Wiring::default(),
            data,
            method,
            bank: 0,
            low: 0,
            high: 0,
            writes: Vec::new(),
            events: Vec::new(),
            failing_reads: 0,
            fail_writes: false,
            glitches: VecDeque::new(),
            noisy: false,
            reads: 0,
        }
    }

    /// The next `count` reads fail at the transport level.
    pub fn fail_next_reads(&mut self, count: usize) {
        self.failing_reads = count;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Successive successful reads return these values in place of the real
    /// data (`None` passes the real data through).
    pub fn glitch(&mut self, values: impl IntoIterator<Item = Option<u8>>) {
        self.glitches.extend(values);
    }

    /// Every read returns a different value.
    pub fn noisy(&mut self) {
        self.noisy = true;
    }

    pub fn address(&self) -> u16 {
        (((self.high as u16) << 8) | self.low as u16) & ADDR_MASK
    }

    pub fn writes(&self) -> &[(u8, u8, u8)] {
        &self.writes
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Last value written to a register, if any.
    pub fn register(&self, chip: u8, register: u8) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(c, r, _)| *c == chip && *r == register)
            .map(|(_, _, v)| *v)
    }

    /// Addresses asserted, in order.
    pub fn addresses(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::SetAddress(a) => Some(*a),
                Event::Read(_) => None,
            })
            .collect()
    }
}

impl RegisterBus for Cartridge {
    type Error = MockFault;

    fn write_register(&mut self, chip: u8, register: u8, value: u8) -> Result<(), MockFault> {
        if self.fail_writes {
            return Err(MockFault);
        }
        self.writes.push((chip, register, value));

        let low = self.wiring.write_low;
        let high = self.wiring.write_high;
        if chip == low.addr && register == low.bank.gpio_reg() {
            self.low = value;
        } else if chip == high.addr && register == high.bank.gpio_reg() {
            self.high = value;
            let address = self.address();
            if let Some(bank) = self.method.hotspots().iter().position(|h| *h == address) {
                self.bank = bank;
            }
            self.events.push(Event::SetAddress(address));
        }
        Ok(())
    }

    fn read_register(&mut self, chip: u8, register: u8) -> Result<u8, MockFault> {
        let read = self.wiring.read;
        if chip != read.addr || register != read.bank.gpio_reg() {
            return Err(MockFault);
        }
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(MockFault);
        }

        self.reads += 1;
        let address = self.address();
        self.events.push(Event::Read(address));

        if self.noisy {
            return Ok(self.reads as u8);
        }
        let real = (self.data)(self.bank, address);
        Ok(self.glitches.pop_front().flatten().unwrap_or(real))
    }
}

/// Delay provider that returns immediately, remembering what it was asked
/// to wait for.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pauses: Vec<Duration>,
}

impl RecordingDelay {
    pub fn total(&self) -> Duration {
        self.pauses.iter().sum()
    }

    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.pauses.push(Duration::from_nanos(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        self.pauses.push(Duration::from_micros(us as u64));
    }
}

pub fn test_link(cart: Cartridge) -> Link<Cartridge, RecordingDelay> {
    Link::new(cart, RecordingDelay::default())
}
