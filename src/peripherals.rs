//! Sample peripherals for the port map in the project's port table
//! (0x00 LEDs, 0x10-0x17 seven-segment, 0x20/0x21 LCD, 0x30 buzzer, 0x40
//! keypad, 0x50-0x57 DIP switches, 0x60 buttons, 0x80-0x9F dot matrix,
//! 0xC0-0xC2 real-time clock).
//!
//! These are illustrative default handlers wired onto a [`Bus`] by
//! [`Bus::with_sample_peripherals`], not the only way to use the bus —
//! an embedder is free to register its own handlers on any port instead.
//! Each peripheral is a small state machine with no timing dependency of
//! its own; a caller drives `Clock::tick` from whatever pacing loop it
//! likes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::bus::Bus;

/// Eight latched LEDs, one bit per LED (OUT 0x00).
#[derive(Debug, Default, Clone, Copy)]
pub struct Leds {
    state: u8,
}

impl Leds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last byte written; bit0 is LED0 through bit7 is LED7.
    pub fn state(&self) -> u8 {
        self.state
    }

    fn write(&mut self, value: u8) {
        self.state = value;
    }
}

/// Eight seven-segment digits, each a segment byte (OUT 0x10..=0x17).
#[derive(Debug, Default, Clone, Copy)]
pub struct SevenSegment {
    digits: [u8; 8],
}

impl SevenSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digits(&self) -> &[u8; 8] {
        &self.digits
    }

    fn write(&mut self, index: usize, value: u8) {
        self.digits[index] = value;
    }
}

/// A character LCD: an 80-byte DDRAM, a cursor, and a command register.
#[derive(Debug, Clone, Copy)]
pub struct Lcd {
    cursor: u8,
    ddram: [u8; 80],
}

impl Lcd {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            ddram: [0; 80],
        }
    }

    pub fn ddram(&self) -> &[u8; 80] {
        &self.ddram
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    /// OUT (0x20): 0x01 clears, 0x18 shifts the cursor left, and
    /// `0x80 | addr` sets the DDRAM address directly.
    fn command(&mut self, value: u8) {
        match value {
            0x01 => {
                self.ddram = [0; 80];
                self.cursor = 0;
            }
            0x18 => {
                self.cursor = (self.cursor + 79) % 80;
            }
            v if v & 0x80 != 0 => {
                self.cursor = (v & 0x7F) % 80;
            }
            _ => {}
        }
    }

    /// OUT (0x21): writes one character at the cursor and advances it,
    /// wrapping at 80 columns.
    fn data(&mut self, value: u8) {
        self.ddram[self.cursor as usize] = value;
        self.cursor = (self.cursor + 1) % 80;
    }
}

impl Default for Lcd {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-tone buzzer (OUT 0x30); 0 silences it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Buzzer {
    tone: u8,
}

impl Buzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tone(&self) -> u8 {
        self.tone
    }

    fn write(&mut self, value: u8) {
        self.tone = value;
    }
}

/// A queue of pending key codes (IN 0x40); an empty queue reads as 0xFF.
#[derive(Debug, Default, Clone)]
pub struct Keypad {
    queue: VecDeque<u8>,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key code 0..=15 for the next `IN (0x40)`.
    pub fn push_key(&mut self, code: u8) {
        self.queue.push_back(code);
    }

    fn pop(&mut self) -> u8 {
        self.queue.pop_front().unwrap_or(0xFF)
    }
}

/// Eight banks of DIP switches (IN 0x50..=0x57), bit0 is the on/off state.
#[derive(Debug, Default, Clone, Copy)]
pub struct DipSwitches {
    banks: [u8; 8],
}

impl DipSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bank(&mut self, index: usize, value: u8) {
        self.banks[index] = value;
    }

    fn read(&self, index: usize) -> u8 {
        self.banks[index]
    }
}

/// A push-button bitmask (IN 0x60), one bit per button.
#[derive(Debug, Default, Clone, Copy)]
pub struct Buttons {
    mask: u8,
}

impl Buttons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mask(&mut self, mask: u8) {
        self.mask = mask;
    }

    fn read(&self) -> u8 {
        self.mask
    }
}

/// A 16x16 dot matrix (OUT 0x80..=0x9F): row r's columns 0-7 live at
/// `0x80 + 2r`, columns 8-15 at `0x80 + 2r + 1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotMatrix {
    columns: [u8; 32],
}

impl DotMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two column-halves latched for row `r` (0..=15).
    pub fn row(&self, r: usize) -> (u8, u8) {
        (self.columns[2 * r], self.columns[2 * r + 1])
    }

    fn write(&mut self, offset: usize, value: u8) {
        self.columns[offset] = value;
    }
}

/// A real-time clock (IN 0xC0/0xC1/0xC2: seconds/minutes/hours).
/// `tick` is driven by the embedder's own pacing loop — the core models
/// the counters only, not wall-clock timing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Clock {
    seconds: u8,
    minutes: u8,
    hours: u8,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn tick(&mut self) {
        self.seconds += 1;
        if self.seconds == 60 {
            self.seconds = 0;
            self.minutes += 1;
            if self.minutes == 60 {
                self.minutes = 0;
                self.hours += 1;
                if self.hours == 24 {
                    self.hours = 0;
                }
            }
        }
    }

    fn read(&self, port: u8) -> u8 {
        match port {
            0xC0 => self.seconds,
            0xC1 => self.minutes,
            0xC2 => self.hours,
            _ => 0xFF,
        }
    }
}

/// Shared handles to every peripheral [`Bus::with_sample_peripherals`]
/// wired up, for a caller that wants to read their state or feed them
/// input (keypad codes, DIP switch banks, button presses, clock ticks).
#[derive(Clone)]
pub struct SamplePeripherals {
    pub leds: Rc<RefCell<Leds>>,
    pub seven_segment: Rc<RefCell<SevenSegment>>,
    pub lcd: Rc<RefCell<Lcd>>,
    pub buzzer: Rc<RefCell<Buzzer>>,
    pub keypad: Rc<RefCell<Keypad>>,
    pub dip_switches: Rc<RefCell<DipSwitches>>,
    pub buttons: Rc<RefCell<Buttons>>,
    pub dot_matrix: Rc<RefCell<DotMatrix>>,
    pub clock: Rc<RefCell<Clock>>,
}

impl Bus {
    /// Build a bus with every sample peripheral in this module already
    /// registered at its documented port(s). Returns the bus along with
    /// shared handles so the caller can inspect or drive them.
    pub fn with_sample_peripherals() -> (Bus, SamplePeripherals) {
        let mut bus = Bus::new();

        let leds = Rc::new(RefCell::new(Leds::new()));
        let leds_handler = leds.clone();
        bus.register_out(0x00, move |v| leds_handler.borrow_mut().write(v));

        let seven_segment = Rc::new(RefCell::new(SevenSegment::new()));
        for digit in 0..8u8 {
            let handler = seven_segment.clone();
            bus.register_out(0x10 + digit, move |v| {
                handler.borrow_mut().write(digit as usize, v)
            });
        }

        let lcd = Rc::new(RefCell::new(Lcd::new()));
        let lcd_cmd = lcd.clone();
        bus.register_out(0x20, move |v| lcd_cmd.borrow_mut().command(v));
        let lcd_data = lcd.clone();
        bus.register_out(0x21, move |v| lcd_data.borrow_mut().data(v));

        let buzzer = Rc::new(RefCell::new(Buzzer::new()));
        let buzzer_handler = buzzer.clone();
        bus.register_out(0x30, move |v| buzzer_handler.borrow_mut().write(v));

        let keypad = Rc::new(RefCell::new(Keypad::new()));
        let keypad_handler = keypad.clone();
        bus.register_in(0x40, move || keypad_handler.borrow_mut().pop());

        let dip_switches = Rc::new(RefCell::new(DipSwitches::new()));
        for bank in 0..8u8 {
            let handler = dip_switches.clone();
            bus.register_in(0x50 + bank, move || handler.borrow().read(bank as usize));
        }

        let buttons = Rc::new(RefCell::new(Buttons::new()));
        let buttons_handler = buttons.clone();
        bus.register_in(0x60, move || buttons_handler.borrow().read());

        let dot_matrix = Rc::new(RefCell::new(DotMatrix::new()));
        for offset in 0..32u8 {
            let handler = dot_matrix.clone();
            bus.register_out(0x80 + offset, move |v| {
                handler.borrow_mut().write(offset as usize, v)
            });
        }

        let clock = Rc::new(RefCell::new(Clock::new()));
        for port in [0xC0u8, 0xC1, 0xC2] {
            let handler = clock.clone();
            bus.register_in(port, move || handler.borrow().read(port));
        }

        (
            bus,
            SamplePeripherals {
                leds,
                seven_segment,
                lcd,
                buzzer,
                keypad,
                dip_switches,
                buttons,
                dot_matrix,
                clock,
            },
        )
    }
}
