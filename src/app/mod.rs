//! Application core — pure session logic, zero I/O.
//!
//! This module contains the rules of the training session: FSM
//! orchestration, lamp frame rendering and pattern persistence requests.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
