//! Directly-wired lamp bank.
//!
//! Adapts `N` [`OutputPin`]s to [`LampBackend`] so the control lamps share
//! the blink engine with the expander panel.  Channel `n` is `pins[n]`.

use embedded_hal::digital::{OutputPin, PinState};

use crate::drivers::blink::LampBackend;
use crate::error::{Error, Result};

pub struct PinLamps<P, const N: usize> {
    pins: [P; N],
    /// Last level written per pin, bit n = pin n.
    levels: u8,
}

impl<P: OutputPin, const N: usize> PinLamps<P, N> {
    pub fn new(pins: [P; N]) -> Self {
        Self { pins, levels: 0 }
    }

    /// Levels most recently driven, bit n = pin n.
    pub fn levels(&self) -> u8 {
        self.levels
    }

    pub fn into_pins(self) -> [P; N] {
        self.pins
    }
}

impl<P: OutputPin + Send, const N: usize> LampBackend for PinLamps<P, N> {
    fn write_masked(&mut self, mask: u8, levels: u8) -> Result<()> {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            let bit = 1u8 << i;
            if mask & bit == 0 {
                continue;
            }
            let high = levels & bit != 0;
            pin.set_state(PinState::from(high))
                .map_err(|_| Error::Pin(i as u8))?;
            if high {
                self.levels |= bit;
            } else {
                self.levels &= !bit;
            }
        }
        Ok(())
    }
}
