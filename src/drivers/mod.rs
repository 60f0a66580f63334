//! Lamp and button drivers, hardware initialisation, and peripheral helpers.

pub mod blink;
pub mod button;
pub mod expander;
pub mod hw_init;
pub mod pin_lamps;
pub mod task_pin;
pub mod watchdog;
