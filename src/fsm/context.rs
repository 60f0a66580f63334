//! Shared mutable context threaded through every FSM handler.
//!
//! `SessionContext` is the single struct that state handlers read from and
//! write to.  It holds the latest button event and input snapshot, the
//! lamp frame the current state wants shown, the pattern and progress
//! counter, and two small queues the service drains after each tick:
//! blocking lamp [`Effect`]s and outbound [`SessionEvent`]s.

use heapless::Vec;

use crate::app::events::SessionEvent;
use crate::config::DeviceConfig;
use crate::drivers::blink::{FlashMode, LampStatus};
use crate::drivers::button::{Button, ButtonEvent, Gesture};
use crate::drivers::expander::InputSnapshot;
use crate::pattern::Pattern;
use crate::pins::PANEL_CHANNEL_COUNT;

// ---------------------------------------------------------------------------
// Lamp frame (written by state handlers; rendered by the service)
// ---------------------------------------------------------------------------

/// What every lamp should show after this tick.
///
/// Persists across ticks: a state that does not render a lamp leaves it as
/// the previous state set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LampFrame {
    pub panel: [LampStatus; PANEL_CHANNEL_COUNT],
    pub back: LampStatus,
    pub pause: LampStatus,
}

// ---------------------------------------------------------------------------
// Effects (blocking lamp choreography requested by handlers)
// ---------------------------------------------------------------------------

/// One step of a blocking lamp sequence, run in order after the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Set every channel of the pattern to this status.
    LightPattern(LampStatus),
    /// Block for this many milliseconds.
    Hold(u32),
    Flash(FlashMode),
    /// Every panel channel OFF.
    ClearPanel,
    /// Persist the current pattern.
    SavePattern,
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct SessionContext {
    // -- Inputs --
    /// Button event for this tick, taken by the handler that acts on it.
    pub event: Option<ButtonEvent>,
    /// Panel inputs for this tick, taken by the DO handler.
    pub snapshot: Option<InputSnapshot>,

    // -- Session data --
    pub pattern: Pattern,
    /// Index into `pattern` of the next channel to press.
    pub progress: usize,
    /// How the current target is shown: BLINK_MED, or BLINK_SHORT after a
    /// wrong press.
    pub target_mode: LampStatus,
    /// Channels still held down since their correct press.
    pub held_correct: u8,
    /// Whether the previous evaluation already flagged a wrong press.
    pub wrong_latched: bool,

    // -- Outputs --
    pub frame: LampFrame,
    pub effects: Vec<Effect, 8>,
    pub outbox: Vec<SessionEvent, 8>,

    // -- Configuration --
    pub config: DeviceConfig,
}

impl SessionContext {
    pub fn new(config: DeviceConfig, pattern: Pattern) -> Self {
        Self {
            event: None,
            snapshot: None,
            pattern,
            progress: 0,
            target_mode: LampStatus::BlinkMed,
            held_correct: 0,
            wrong_latched: false,
            frame: LampFrame::default(),
            effects: Vec::new(),
            outbox: Vec::new(),
            config,
        }
    }

    /// Take this tick's event if it is a press, returning the button.
    /// A long hold is left in place.
    pub fn take_press(&mut self) -> Option<Button> {
        match self.event {
            Some(ev) if ev.gesture == Gesture::Press => {
                self.event = None;
                Some(ev.button)
            }
            _ => None,
        }
    }

    /// Take this tick's event if it is a long hold.
    pub fn take_long_hold(&mut self) -> bool {
        match self.event {
            Some(ev) if ev.gesture == Gesture::LongHold => {
                self.event = None;
                true
            }
            _ => false,
        }
    }

    /// Queue an outbound event.  Dropped if eight are already pending.
    pub fn emit(&mut self, event: SessionEvent) {
        let _ = self.outbox.push(event);
    }

    /// Queue a lamp effect.  Dropped if eight are already pending.
    pub fn push_effect(&mut self, effect: Effect) {
        let _ = self.effects.push(effect);
    }

    /// The panel channel currently to be pressed.
    pub fn target(&self) -> Option<u8> {
        self.pattern.get(self.progress)
    }
}
