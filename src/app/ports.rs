//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionService (domain)
//! ```
//!
//! Driven adapters (lamp banks, pattern storage, event sinks) implement
//! these traits.  The [`SessionService`](super::service::SessionService)
//! consumes them via generics, so the session logic never touches hardware
//! directly and runs unchanged on the host test harness.

use crate::drivers::blink::{FlashMode, LampStatus};
use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Lamp port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The two directly-wired lamps the session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlLamp {
    /// Lamp over the back/pause button.
    Back = 0,
    /// Pause indicator.
    Pause = 1,
}

/// Write-side port: the session calls this to change what the operator sees.
pub trait LampPort {
    /// Set one panel channel (0–7).
    fn set_panel(&mut self, channel: u8, status: LampStatus) -> Result<()>;

    /// Set every panel channel at once.
    fn set_all_panel(&mut self, status: LampStatus) -> Result<()>;

    /// Set a control lamp.
    fn set_control(&mut self, lamp: ControlLamp, status: LampStatus) -> Result<()>;

    /// Run a blocking flash animation over the panel.
    fn flash(&mut self, mode: FlashMode) -> Result<()>;

    /// Block for `ms` milliseconds while the renderers keep running.
    fn hold(&mut self, ms: u32);

    /// Every lamp, panel and control, OFF.
    fn all_off(&mut self) -> Result<()>;

    /// Step every control lamp through each status (boot self-test).
    fn lamp_test(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The session emits structured [`SessionEvent`](super::events::SessionEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::SessionEvent);
}

// ───────────────────────────────────────────────────────────────
// Pattern store port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent home of the press order.
///
/// The store deals in raw ordered channel lists; validation belongs to
/// [`Pattern`](crate::pattern::Pattern).  Writes MUST be atomic.  The
/// ESP-IDF NVS API guarantees this natively.
pub trait PatternStore {
    /// The stored list, or `None` if nothing was ever saved.
    fn load_pattern(&self) -> core::result::Result<Option<Vec<u8>>, StorageError>;

    /// Replace the stored list.
    fn save_pattern(&mut self, channels: &[u8]) -> core::result::Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`PatternStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Stored blob failed to decode.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "stored data corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for StorageError {}
