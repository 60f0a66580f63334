//! Mock adapters for integration tests.
//!
//! Records every lamp call so tests can assert on the full command
//! history without touching a real expander or GPIO.  The fake bus and
//! pins below stand in for the hardware under the real blink engines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, Operation};
use pokayoke::app::events::SessionEvent;
use pokayoke::app::ports::{ControlLamp, EventSink, LampPort, PatternStore, StorageError};
use pokayoke::drivers::blink::{FlashMode, LampStatus};
use pokayoke::drivers::button::{Button, ButtonEvent, Gesture};
use pokayoke::error::{Error, Result};

// ── Lamp call record ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LampCall {
    Panel(u8, LampStatus),
    AllPanel(LampStatus),
    Control(ControlLamp, LampStatus),
    Flash(FlashMode),
    Hold(u32),
    AllOff,
    LampTest,
}

// ── MockLamps ─────────────────────────────────────────────────

pub struct MockLamps {
    pub calls: Vec<LampCall>,
    pub panel: [LampStatus; 8],
    pub back: LampStatus,
    pub pause: LampStatus,
    /// While set, every write fails and nothing is recorded.
    pub offline: bool,
}

#[allow(dead_code)]
impl MockLamps {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            panel: [LampStatus::Off; 8],
            back: LampStatus::Off,
            pause: LampStatus::Off,
            offline: false,
        }
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn flashes(&self) -> Vec<FlashMode> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                LampCall::Flash(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.offline {
            Err(Error::Pin(0))
        } else {
            Ok(())
        }
    }
}

impl Default for MockLamps {
    fn default() -> Self {
        Self::new()
    }
}

impl LampPort for MockLamps {
    fn set_panel(&mut self, channel: u8, status: LampStatus) -> Result<()> {
        if channel >= 8 {
            return Err(Error::InvalidChannel(channel));
        }
        self.check()?;
        self.panel[usize::from(channel)] = status;
        self.calls.push(LampCall::Panel(channel, status));
        Ok(())
    }

    fn set_all_panel(&mut self, status: LampStatus) -> Result<()> {
        self.check()?;
        self.panel = [status; 8];
        self.calls.push(LampCall::AllPanel(status));
        Ok(())
    }

    fn set_control(&mut self, lamp: ControlLamp, status: LampStatus) -> Result<()> {
        self.check()?;
        match lamp {
            ControlLamp::Back => self.back = status,
            ControlLamp::Pause => self.pause = status,
        }
        self.calls.push(LampCall::Control(lamp, status));
        Ok(())
    }

    fn flash(&mut self, mode: FlashMode) -> Result<()> {
        self.check()?;
        self.calls.push(LampCall::Flash(mode));
        Ok(())
    }

    fn hold(&mut self, ms: u32) {
        self.calls.push(LampCall::Hold(ms));
    }

    fn all_off(&mut self) -> Result<()> {
        self.check()?;
        self.panel = [LampStatus::Off; 8];
        self.back = LampStatus::Off;
        self.pause = LampStatus::Off;
        self.calls.push(LampCall::AllOff);
        Ok(())
    }

    fn lamp_test(&mut self) -> Result<()> {
        self.check()?;
        self.calls.push(LampCall::LampTest);
        Ok(())
    }
}

// ── MockStore ─────────────────────────────────────────────────

pub struct MockStore {
    pub stored: Option<Vec<u8>>,
    pub saves: usize,
    /// Returned from `save_pattern` instead of storing.
    pub fail_with: Option<StorageError>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            stored: None,
            saves: 0,
            fail_with: None,
        }
    }

    pub fn with(channels: &[u8]) -> Self {
        Self {
            stored: Some(channels.to_vec()),
            ..Self::new()
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore for MockStore {
    fn load_pattern(&self) -> core::result::Result<Option<Vec<u8>>, StorageError> {
        Ok(self.stored.clone())
    }

    fn save_pattern(&mut self, channels: &[u8]) -> core::result::Result<(), StorageError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        self.stored = Some(channels.to_vec());
        self.saves += 1;
        Ok(())
    }
}

// ── CollectSink ───────────────────────────────────────────────

pub struct CollectSink {
    pub events: Vec<SessionEvent>,
}

#[allow(dead_code)]
impl CollectSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CollectSink {
    fn emit(&mut self, event: &SessionEvent) {
        self.events.push(*event);
    }
}

// ── Event helpers ─────────────────────────────────────────────

#[allow(dead_code)]
pub fn press(button: Button, at_ms: u32) -> ButtonEvent {
    ButtonEvent {
        button,
        gesture: Gesture::Press,
        at_ms,
    }
}

#[allow(dead_code)]
pub fn long_hold(at_ms: u32) -> ButtonEvent {
    ButtonEvent {
        button: Button::Back,
        gesture: Gesture::LongHold,
        at_ms,
    }
}

// ── FakeExpander (MCP23017 register file on the I²C bus) ──────

/// Register file shared between the fake bus and the test body, so the
/// test can poke input levels after the expander is moved into a bank.
pub type Registers = Arc<Mutex<[u8; 0x16]>>;

pub struct FakeExpander {
    regs: Registers,
    offline: Arc<AtomicBool>,
    pointer: usize,
}

#[allow(dead_code)]
impl FakeExpander {
    pub fn new() -> Self {
        Self {
            regs: Arc::new(Mutex::new([0; 0x16])),
            offline: Arc::new(AtomicBool::new(false)),
            pointer: 0,
        }
    }

    pub fn registers(&self) -> Registers {
        Arc::clone(&self.regs)
    }

    /// Flag that makes every transaction fail while set.
    pub fn offline_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.offline)
    }
}

impl Default for FakeExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl i2c::ErrorType for FakeExpander {
    type Error = i2c::ErrorKind;
}

impl I2c for FakeExpander {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> core::result::Result<(), Self::Error> {
        if self.offline.load(Ordering::Acquire) {
            return Err(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            ));
        }
        let mut regs = self.regs.lock().unwrap();
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        self.pointer = usize::from(reg);
                        for &b in data {
                            regs[self.pointer % 0x16] = b;
                            self.pointer += 1;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = regs[self.pointer % 0x16];
                        self.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

// ── NoDelay ───────────────────────────────────────────────────

/// Delay that returns at once and adds up what it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ms: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}

// ── FakePin ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePin {
    pub high: bool,
}

impl digital::ErrorType for FakePin {
    type Error = digital::ErrorKind;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}
