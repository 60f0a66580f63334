//! Unified error types for the POKAYOKE firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the main
//! loop and the session service handle lamp, bus and config failures the
//! same way.  All variants are `Copy` so they can be carried inside session
//! events without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A lamp status update addressed a channel the bank does not have.
    InvalidChannel(u8),
    /// A register transaction with the I/O expander failed.
    Bus(BusError),
    /// A directly-wired output pin rejected a level change.
    Pin(u8),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration or pattern data is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "channel {ch} is not found"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Pin(idx) => write!(f, "output pin {idx} write failed"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Which half of a register transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    Read,
    Write,
}

/// A register transaction the expander did not acknowledge.
///
/// The driver never retries; retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    /// Register address the transaction targeted.
    pub register: u8,
    pub direction: BusDirection,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            BusDirection::Read => "read",
            BusDirection::Write => "write",
        };
        write!(f, "{} of register 0x{:02x} failed", dir, self.register)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
