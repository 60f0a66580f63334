//! MCP23017 16-bit I²C I/O expander driver.
//!
//! ## Wiring
//!
//! Port A (GPA0–7) drives the eight panel button lamps; port B (GPB0–7)
//! reads the eight panel buttons against the internal pull-ups.  Channel
//! `n` is bit `n` on both ports.
//!
//! ## Register access
//!
//! Only single-register transactions are issued (IOCON.BANK = 0, byte
//! mode).  There is no partial-write primitive at this layer: callers that
//! need single-bit updates read the output latch, modify, and write it
//! back.  [`OutputChannel`](super::blink::OutputChannel) owns the driver
//! behind a mutex so those read-modify-write cycles never interleave.

use embedded_hal::i2c::{Error as _, I2c};
use log::{info, warn};

use crate::drivers::blink::LampBackend;
use crate::error::{BusDirection, BusError, Result};

// ── Register map (IOCON.BANK = 0) ─────────────────────────────

pub mod reg {
    /// I/O direction (1 = input, 0 = output)
    pub const IODIRA: u8 = 0x00;
    pub const IODIRB: u8 = 0x01;
    /// Input polarity (1 = inverted)
    pub const IPOLA: u8 = 0x02;
    pub const IPOLB: u8 = 0x03;
    /// Interrupt-on-change enable
    pub const GPINTENA: u8 = 0x04;
    pub const GPINTENB: u8 = 0x05;
    /// Default compare value for interrupt-on-change
    pub const DEFVALA: u8 = 0x06;
    pub const DEFVALB: u8 = 0x07;
    /// Interrupt control (0 = compare with previous, 1 = compare with DEFVAL)
    pub const INTCONA: u8 = 0x08;
    pub const INTCONB: u8 = 0x09;
    /// Configuration
    pub const IOCONA: u8 = 0x0a;
    pub const IOCONB: u8 = 0x0b;
    /// Pull-up enable (100 kΩ)
    pub const GPPUA: u8 = 0x0c;
    pub const GPPUB: u8 = 0x0d;
    /// Interrupt flags (cleared by reading INTCAP or GPIO)
    pub const INTFA: u8 = 0x0e;
    pub const INTFB: u8 = 0x0f;
    /// Port value captured at interrupt time
    pub const INTCAPA: u8 = 0x10;
    pub const INTCAPB: u8 = 0x11;
    /// Port level
    pub const GPIOA: u8 = 0x12;
    pub const GPIOB: u8 = 0x13;
    /// Output latch
    pub const OLATA: u8 = 0x14;
    pub const OLATB: u8 = 0x15;
}

/// IOCON: sequential addressing on, INT pins open-drain, active-high.
const IOCON_INIT: u8 = 0b0000_0110;
/// Port A: all outputs.
const PORT_A_DIRECTION: u8 = 0x00;
/// Port B: all inputs.
const PORT_B_DIRECTION: u8 = 0xff;

/// Default 7-bit address (A0 = A1 = A2 = LOW).
pub const DEFAULT_ADDRESS: u8 = 0x20;

/// A debounced-enough view of the panel buttons, taken once per main-loop
/// iteration.
///
/// Bit `n` set means panel button `n` is pressed, whatever the electrical
/// polarity of the input bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    pressed: u8,
}

impl InputSnapshot {
    /// Normalise a raw GPIOB read.
    pub fn from_raw(raw: u8, active_low: bool) -> Self {
        Self {
            pressed: if active_low { !raw } else { raw },
        }
    }

    /// Build a snapshot from an already-normalised pressed mask.
    pub fn from_pressed(mask: u8) -> Self {
        Self { pressed: mask }
    }

    pub fn is_pressed(&self, channel: u8) -> bool {
        channel < 8 && self.pressed & (1 << channel) != 0
    }

    pub fn pressed_mask(&self) -> u8 {
        self.pressed
    }
}

/// Register-level MCP23017 driver over any `embedded-hal` 1.0 I²C bus.
pub struct Mcp23017<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mcp23017<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Configure port A as outputs (all off) and port B as pulled-up
    /// inputs with change interrupts disabled.
    ///
    /// Safe to call again; every register is rewritten.
    pub fn initialize(&mut self) -> Result<()> {
        self.write_register(reg::IOCONA, IOCON_INIT)?;
        self.write_register(reg::IODIRA, PORT_A_DIRECTION)?;
        self.write_register(reg::IOCONB, IOCON_INIT)?;
        self.write_register(reg::IODIRB, PORT_B_DIRECTION)?;
        self.write_register(reg::GPPUB, 0xff)?;
        self.write_register(reg::GPINTENB, 0x00)?;
        self.write_outputs(0x00)?;
        info!(
            "mcp23017@0x{:02x}: port A = 8 outputs, port B = 8 pulled-up inputs",
            self.address
        );
        Ok(())
    }

    /// Replace the whole port A output latch.
    pub fn write_outputs(&mut self, mask: u8) -> Result<()> {
        self.write_register(reg::OLATA, mask)
    }

    /// Current port A output latch.
    pub fn read_output_latch(&mut self) -> Result<u8> {
        self.read_register(reg::OLATA)
    }

    /// Current port B levels; channel 0 = bit 0.
    pub fn read_inputs(&mut self) -> Result<u8> {
        self.read_register(reg::GPIOB)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| {
                warn!("mcp23017: write 0x{:02x} failed ({:?})", register, e.kind());
                BusError {
                    register,
                    direction: BusDirection::Write,
                }
                .into()
            })
    }

    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| {
                warn!("mcp23017: read 0x{:02x} failed ({:?})", register, e.kind());
                BusError {
                    register,
                    direction: BusDirection::Read,
                }
            })?;
        Ok(buf[0])
    }
}

impl<I2C: I2c + Send> LampBackend for Mcp23017<I2C> {
    /// Read-modify-write of the port A latch.  Skips the write when no
    /// masked bit changes.
    fn write_masked(&mut self, mask: u8, levels: u8) -> Result<()> {
        let current = self.read_output_latch()?;
        let next = (current & !mask) | (levels & mask);
        if next != current {
            self.write_outputs(next)?;
        }
        Ok(())
    }

    /// A whole-bank update is a single OLATA write.
    fn write_all(&mut self, levels: u8) -> Result<()> {
        self.write_outputs(levels)
    }
}
