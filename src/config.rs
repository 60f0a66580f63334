//! System configuration parameters
//!
//! All tunable timing and bus parameters for the trainer.  Pin numbers
//! live in [`crate::pins`]; the press order itself is the persisted
//! [`Pattern`](crate::pattern::Pattern), not part of this struct.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Blink engine ---
    /// Renderer tick period (milliseconds).  One blink phase step per tick.
    pub blink_interval_ms: u32,

    // --- Main loop ---
    /// Sleep between main-loop iterations (milliseconds)
    pub loop_interval_ms: u32,
    /// Task watchdog timeout for the main loop (milliseconds)
    pub watchdog_timeout_ms: u32,

    // --- Buttons ---
    /// Edges closer than this to the last accepted edge on a pin are ignored
    pub debounce_ms: u32,
    /// A back-button hold must last longer than this to count as a long hold
    pub long_hold_min_ms: u32,
    /// ...and shorter than this
    pub long_hold_max_ms: u32,
    /// Expander inputs read LOW while pressed (pull-ups enabled)
    pub inputs_active_low: bool,

    // --- Expander bus ---
    /// 7-bit I²C slave address of the MCP23017
    pub expander_address: u8,
    /// I²C clock (Hz)
    pub i2c_baudrate_hz: u32,

    // --- Feedback choreography ---
    /// Step period of the sweep flash (milliseconds)
    pub sweep_step_ms: u32,
    /// Half-period of the panel blink flash (milliseconds)
    pub blink_step_ms: u32,
    /// Number of on/off cycles in the panel blink flash
    pub blink_repeats: u8,
    /// How long the completed pattern stays lit before the flash (milliseconds)
    pub complete_hold_ms: u32,
    /// How long the confirmed range blinks before the flash (milliseconds)
    pub confirm_hold_ms: u32,
    /// Dwell per status during the boot lamp test (0 = skip)
    pub lamp_test_dwell_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // Blink engine
            blink_interval_ms: 150,

            // Main loop
            loop_interval_ms: 10,
            watchdog_timeout_ms: 10_000,

            // Buttons
            debounce_ms: 100,
            long_hold_min_ms: 700,
            long_hold_max_ms: 3500,
            inputs_active_low: true,

            // Expander bus
            expander_address: 0x20,
            i2c_baudrate_hz: 100_000,

            // Feedback choreography
            sweep_step_ms: 30,
            blink_step_ms: 80,
            blink_repeats: 4,
            complete_hold_ms: 500,
            confirm_hold_ms: 1000,
            lamp_test_dwell_ms: 500,
        }
    }
}

impl DeviceConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<()> {
        if !(20..=2000).contains(&self.blink_interval_ms) {
            return Err(Error::Config("blink_interval_ms must be 20–2000"));
        }
        if !(1..=100).contains(&self.loop_interval_ms) {
            return Err(Error::Config("loop_interval_ms must be 1–100"));
        }
        if self.watchdog_timeout_ms < 1000 {
            return Err(Error::Config("watchdog_timeout_ms must be at least 1000"));
        }
        if self.debounce_ms > 1000 {
            return Err(Error::Config("debounce_ms must be 0–1000"));
        }
        if self.long_hold_min_ms >= self.long_hold_max_ms {
            return Err(Error::Config(
                "long_hold_min_ms must be < long_hold_max_ms",
            ));
        }
        if !(0x20..=0x27).contains(&self.expander_address) {
            return Err(Error::Config("expander_address must be 0x20–0x27"));
        }
        if !(10_000..=1_700_000).contains(&self.i2c_baudrate_hz) {
            return Err(Error::Config("i2c_baudrate_hz must be 10 kHz–1.7 MHz"));
        }
        if self.blink_repeats == 0 {
            return Err(Error::Config("blink_repeats must be at least 1"));
        }
        Ok(())
    }
}
