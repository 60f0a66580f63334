//! Edge-driven control button monitor with debounce and long-hold detection.
//!
//! ## Hardware
//!
//! Four active-low momentary switches on directly-wired GPIOs with
//! internal pull-ups.  Each pin interrupts on any edge; the ISR timestamps
//! the edge and pushes it onto [`EdgeQueue`].  Nothing else happens in
//! interrupt context.
//!
//! ## Gesture detection
//!
//! The main loop drains the queue in FIFO order through
//! [`InputMonitor::process`]:
//!
//! | Gesture   | Condition                                                  |
//! |-----------|------------------------------------------------------------|
//! | Press     | Rising (pressed) edge on any button                        |
//! | LongHold  | Back released 700–3500 ms after a press made while paused  |
//!
//! An edge arriving within the debounce window (100 ms) of the last
//! accepted edge on the same pin is dropped.  Both edge kinds count as
//! accepted, so release bounce is filtered the same way as press bounce.

use heapless::mpmc::MpMcQueue;
use log::debug;

use crate::config::DeviceConfig;

/// Queue depth; about eight full press/release cycles per button.
const EDGE_QUEUE_DEPTH: usize = 32;

/// Control button identity.  The discriminant indexes
/// [`BUTTON_GPIOS`](crate::pins::BUTTON_GPIOS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    Select = 0,
    Up = 1,
    Down = 2,
    Back = 3,
}

impl Button {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [Self::Select, Self::Up, Self::Down, Self::Back];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Up => "up",
            Self::Down => "down",
            Self::Back => "back",
        }
    }
}

/// Electrical edge, already translated to press semantics: `Rising` is
/// the button going down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// One edge as recorded by the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge {
    pub button: Button,
    pub edge: Edge,
    /// Milliseconds since boot, truncated.
    pub at_ms: u32,
}

/// Lock-free multi-producer queue between the button ISRs and the main loop.
pub struct EdgeQueue {
    inner: MpMcQueue<RawEdge, EDGE_QUEUE_DEPTH>,
}

impl EdgeQueue {
    pub const fn new() -> Self {
        Self {
            inner: MpMcQueue::new(),
        }
    }

    /// Enqueue from interrupt context.  Returns `false` when the queue is
    /// full and the edge was dropped.
    pub fn push_from_isr(&self, edge: RawEdge) -> bool {
        self.inner.enqueue(edge).is_ok()
    }

    pub fn pop(&self) -> Option<RawEdge> {
        self.inner.dequeue()
    }
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Press,
    LongHold,
}

/// A classified button gesture, consumed once by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub gesture: Gesture,
    pub at_ms: u32,
}

impl ButtonEvent {
    pub fn is_press(&self, button: Button) -> bool {
        self.button == button && self.gesture == Gesture::Press
    }
}

/// Debounce and long-hold state for the four control buttons.
pub struct InputMonitor {
    debounce_ms: u32,
    hold_min_ms: u32,
    hold_max_ms: u32,
    last_accepted: [Option<u32>; Button::COUNT],
    hold_started_ms: Option<u32>,
}

impl InputMonitor {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            hold_min_ms: config.long_hold_min_ms,
            hold_max_ms: config.long_hold_max_ms,
            last_accepted: [None; Button::COUNT],
            hold_started_ms: None,
        }
    }

    /// Classify one raw edge.  `paused` is whether the session is in PAUSE
    /// when the edge is processed; it arms long-hold detection on Back.
    pub fn process(&mut self, raw: RawEdge, paused: bool) -> Option<ButtonEvent> {
        let slot = &mut self.last_accepted[raw.button.index()];
        if let Some(last) = *slot {
            if raw.at_ms.wrapping_sub(last) < self.debounce_ms {
                debug!("{}: bounce dropped", raw.button.name());
                return None;
            }
        }
        *slot = Some(raw.at_ms);

        match raw.edge {
            Edge::Rising => {
                if raw.button == Button::Back && paused {
                    self.hold_started_ms = Some(raw.at_ms);
                }
                Some(ButtonEvent {
                    button: raw.button,
                    gesture: Gesture::Press,
                    at_ms: raw.at_ms,
                })
            }
            Edge::Falling if raw.button == Button::Back => {
                let started = self.hold_started_ms.take()?;
                let held = raw.at_ms.wrapping_sub(started);
                if held > self.hold_min_ms && held < self.hold_max_ms {
                    Some(ButtonEvent {
                        button: Button::Back,
                        gesture: Gesture::LongHold,
                        at_ms: raw.at_ms,
                    })
                } else {
                    debug!("back held {} ms, outside long-hold window", held);
                    None
                }
            }
            Edge::Falling => None,
        }
    }

    /// Whether a Back hold is currently being timed.
    pub fn hold_armed(&self) -> bool {
        self.hold_started_ms.is_some()
    }
}
