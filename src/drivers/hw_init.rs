//! One-shot control-button GPIO setup and interrupt wiring.
//!
//! Configures the four control button pins and registers one ISR per pin
//! using raw ESP-IDF sys calls.  The ISRs only timestamp the edge and push
//! it onto [`BUTTON_EDGES`]; the main loop does everything else.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::drivers::button::EdgeQueue;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrHandlerFailed { gpio: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrHandlerFailed { gpio, rc } => {
                write!(f, "ISR handler for GPIO{} failed (rc={})", gpio, rc)
            }
        }
    }
}

impl std::error::Error for HwInitError {}

/// Edges recorded by the button ISRs, drained by the main loop.
///
/// Interrupt handlers have no captured state, so this queue is the one
/// static in the firmware.
pub static BUTTON_EDGES: EdgeQueue = EdgeQueue::new();

#[cfg(target_os = "espidf")]
use log::{info, warn};

#[cfg(target_os = "espidf")]
use crate::drivers::button::{Button, Edge, RawEdge};
#[cfg(target_os = "espidf")]
use crate::pins;

// ── GPIO Inputs ───────────────────────────────────────────────

/// Configure the control buttons as pulled-up inputs interrupting on
/// both edges.
#[cfg(target_os = "espidf")]
pub fn init_button_inputs() -> Result<(), HwInitError> {
    let mask = pins::BUTTON_GPIOS
        .iter()
        .fold(0u64, |acc, &pin| acc | (1u64 << pin));
    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    // SAFETY: called once from main() before the ISRs are attached.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    info!("hw_init: {} control buttons configured", pins::BUTTON_GPIOS.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_button_inputs() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): button GPIO config skipped");
    Ok(())
}

// ── GPIO ISR Service ──────────────────────────────────────────

/// Shared handler for all four buttons; `arg` carries the button index.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    let idx = arg as usize;
    let Some(button) = Button::from_index(idx) else {
        return;
    };
    // SAFETY: esp_timer_get_time and gpio_get_level are register reads;
    // safe in ISR context.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    let level = unsafe { gpio_get_level(pins::BUTTON_GPIOS[idx]) };
    // Active-low: LOW means the button just went down.
    let edge = if level == 0 { Edge::Rising } else { Edge::Falling };
    // A full queue drops the edge; the next press is still seen.
    let _ = BUTTON_EDGES.push_from_isr(RawEdge {
        button,
        edge,
        at_ms: now_ms,
    });
}

/// Install the per-pin GPIO ISR service and attach the button handlers.
/// Call after `init_button_inputs()` and before the main loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed. The handler registered below is a
    // static function that only pushes to the lock-free edge queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for (idx, &gpio) in pins::BUTTON_GPIOS.iter().enumerate() {
            gpio_set_intr_type(gpio, gpio_int_type_t_GPIO_INTR_ANYEDGE);
            let ret = gpio_isr_handler_add(gpio, Some(button_gpio_isr), idx as *mut _);
            if ret != ESP_OK {
                return Err(HwInitError::IsrHandlerFailed { gpio, rc: ret });
            }
            gpio_intr_enable(gpio);
        }
    }
    info!("hw_init: ISR service installed (select, up, down, back)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

/// Detach the button handlers.  No edge is queued after this returns.
#[cfg(target_os = "espidf")]
pub fn detach_isr_service() {
    for &gpio in &pins::BUTTON_GPIOS {
        // SAFETY: removing a handler that was never added returns an error
        // code and has no other effect.
        let ret = unsafe {
            gpio_intr_disable(gpio);
            gpio_isr_handler_remove(gpio)
        };
        if ret != ESP_OK {
            warn!("hw_init: ISR remove for GPIO{} returned {}", gpio, ret);
        }
    }
    info!("hw_init: button ISRs detached");
}

#[cfg(not(target_os = "espidf"))]
pub fn detach_isr_service() {
    log::info!("hw_init(sim): ISR detach skipped");
}
