//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured session events to the
//! logger (UART / USB-CDC in production, stderr on the host).

use log::{info, warn};

use crate::app::events::SessionEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`SessionEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started(state) => {
                info!("START | initial_state={}", state.name());
            }
            SessionEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            SessionEvent::Advanced { step, of, channel } => {
                info!("STEP  | {}/{} (channel {})", step, of, channel);
            }
            SessionEvent::WrongButton { target, pressed } => {
                info!("WRONG | target={} pressed=0b{:08b}", target, pressed);
            }
            SessionEvent::RoundComplete { length } => {
                info!("DONE  | {} channels pressed in order", length);
            }
            SessionEvent::RangeEdited { length, last } => {
                info!("RANGE | length={} last={}", length, last);
            }
            SessionEvent::PatternSaved { length } => {
                info!("SAVE  | pattern of {} stored", length);
            }
            SessionEvent::PatternSaveFailed(e) => {
                warn!("SAVE  | failed: {}", e);
            }
            SessionEvent::LampFault(e) => {
                warn!("LAMP  | {}", e);
            }
        }
    }
}
