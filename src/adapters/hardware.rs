//! Hardware adapter — bridges the lamp banks to the domain port trait.
//!
//! Owns handles to both blink engines (expander panel and directly-wired
//! control lamps) plus a blocking delay, exposing them through
//! [`LampPort`].  The renderer threads hold the other handles, so the
//! banks keep blinking while this adapter blocks in `hold` or `flash`.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{ControlLamp, LampPort};
use crate::config::DeviceConfig;
use crate::drivers::blink::{
    ALL_CHANNELS, FlashMode, FlashTiming, LampBackend, LampStatus, OutputChannel,
};
use crate::error::Result;
use crate::pins::{CONTROL_LAMP_COUNT, PANEL_CHANNEL_COUNT};

/// Self-test order for the control lamps.
const LAMP_TEST_SEQUENCE: [LampStatus; 5] = [
    LampStatus::On,
    LampStatus::BlinkLong,
    LampStatus::BlinkMed,
    LampStatus::BlinkShort,
    LampStatus::Off,
];

/// Concrete adapter that combines both lamp banks behind [`LampPort`].
pub struct PanelHardware<P, C, D> {
    panel: Arc<OutputChannel<P, PANEL_CHANNEL_COUNT>>,
    control: Arc<OutputChannel<C, CONTROL_LAMP_COUNT>>,
    delay: D,
    timing: FlashTiming,
    lamp_test_dwell_ms: u32,
}

impl<P, C, D> PanelHardware<P, C, D>
where
    P: LampBackend,
    C: LampBackend,
    D: DelayNs,
{
    pub fn new(
        panel: Arc<OutputChannel<P, PANEL_CHANNEL_COUNT>>,
        control: Arc<OutputChannel<C, CONTROL_LAMP_COUNT>>,
        delay: D,
        config: &DeviceConfig,
    ) -> Self {
        Self {
            panel,
            control,
            delay,
            timing: FlashTiming::from(config),
            lamp_test_dwell_ms: config.lamp_test_dwell_ms,
        }
    }

    pub fn panel(&self) -> &Arc<OutputChannel<P, PANEL_CHANNEL_COUNT>> {
        &self.panel
    }

    pub fn control(&self) -> &Arc<OutputChannel<C, CONTROL_LAMP_COUNT>> {
        &self.control
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

// ── LampPort implementation ───────────────────────────────────

impl<P, C, D> LampPort for PanelHardware<P, C, D>
where
    P: LampBackend,
    C: LampBackend,
    D: DelayNs,
{
    fn set_panel(&mut self, channel: u8, status: LampStatus) -> Result<()> {
        self.panel.update(channel, status)
    }

    fn set_all_panel(&mut self, status: LampStatus) -> Result<()> {
        self.panel.update(ALL_CHANNELS, status)
    }

    fn set_control(&mut self, lamp: ControlLamp, status: LampStatus) -> Result<()> {
        self.control.update(lamp as u8, status)
    }

    fn flash(&mut self, mode: FlashMode) -> Result<()> {
        self.panel.flash(mode, &self.timing, &mut self.delay)
    }

    fn hold(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn all_off(&mut self) -> Result<()> {
        // Both banks are attempted even if the first fails.
        let panel = self.panel.update(ALL_CHANNELS, LampStatus::Off);
        let control = self.control.update(ALL_CHANNELS, LampStatus::Off);
        panel.and(control)
    }

    fn lamp_test(&mut self) -> Result<()> {
        if self.lamp_test_dwell_ms == 0 {
            return Ok(());
        }
        info!(
            "lamp test: {} control lamps, {} ms per status",
            CONTROL_LAMP_COUNT, self.lamp_test_dwell_ms
        );
        for status in LAMP_TEST_SEQUENCE {
            self.control.update(ALL_CHANNELS, status)?;
            self.delay.delay_ms(self.lamp_test_dwell_ms);
        }
        Ok(())
    }
}
