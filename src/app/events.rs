//! Outbound session events.
//!
//! The [`SessionService`](super::service::SessionService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them.

use crate::app::ports::StorageError;
use crate::error::Error;
use crate::fsm::StateId;

/// Structured events emitted by the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A correct press moved the progress counter.
    Advanced { step: u8, of: u8, channel: u8 },

    /// A panel button other than the target went down.
    WrongButton { target: u8, pressed: u8 },

    /// The whole pattern was pressed in order.
    RoundComplete { length: u8 },

    /// The range was edited in CHANGERANGE.
    RangeEdited { length: u8, last: u8 },

    /// The confirmed pattern reached the store.
    PatternSaved { length: u8 },

    /// The confirmed pattern could not be stored; the session carries on.
    PatternSaveFailed(StorageError),

    /// A lamp write failed; the frame is re-applied next iteration.
    LampFault(Error),
}
