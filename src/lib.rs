//! POKAYOKE press-in-order trainer firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pattern;
pub mod pins;

// The ESP-IDF paths inside these are cfg-gated; the host build gets the
// simulation stubs.
pub mod adapters;
pub mod drivers;
