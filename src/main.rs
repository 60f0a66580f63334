//! POKAYOKE Firmware — Main Entry Point
//!
//! Hexagonal architecture: the session core never touches hardware.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PanelHardware        LogEventSink        NvsAdapter           │
//! │  (LampPort)           (EventSink)         (PatternStore)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            SessionService (pure logic)                 │    │
//! │  │  FSM · Pattern · InputMonitor                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Renderers (core 1) · GPIO ISRs → EdgeQueue · Watchdog         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{OutputPin as _, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use pokayoke::adapters::hardware::PanelHardware;
use pokayoke::adapters::log_sink::LogEventSink;
use pokayoke::adapters::nvs::NvsAdapter;
use pokayoke::app::ports::LampPort;
use pokayoke::app::service::SessionService;
use pokayoke::config::DeviceConfig;
use pokayoke::drivers::blink::{OutputChannel, spawn_renderer};
use pokayoke::drivers::button::InputMonitor;
use pokayoke::drivers::expander::Mcp23017;
use pokayoke::drivers::hw_init::{self, BUTTON_EDGES};
use pokayoke::drivers::pin_lamps::PinLamps;
use pokayoke::drivers::task_pin::{self, Core};
use pokayoke::drivers::watchdog::Watchdog;
use pokayoke::pattern::Pattern;

/// Ctrl-C on the serial console.
const INTERRUPT_BYTE: u8 = 0x03;

/// Below the renderers; the reader spends its life blocked on stdin.
const CONSOLE_PRIORITY: u8 = 3;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  POKAYOKE v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = DeviceConfig::default();
    config.validate().context("device config")?;

    // ── 2. Expander panel on I²C (GPIO14 SDA / GPIO15 SCL) ────
    let peripherals = Peripherals::take()?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio14,
        peripherals.pins.gpio15,
        &I2cConfig::new().baudrate(Hertz(config.i2c_baudrate_hz)),
    )?;
    let mut expander = Mcp23017::new(i2c, config.expander_address);
    expander.initialize().context("MCP23017 init")?;

    // ── 3. Control lamps on GPIO4..7 ──────────────────────────
    let control_pins = PinLamps::new([
        PinDriver::output(peripherals.pins.gpio4.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio5.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio6.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio7.downgrade_output())?,
    ]);

    let panel = Arc::new(OutputChannel::new(expander));
    let control = Arc::new(OutputChannel::new(control_pins));

    let blink_interval = Duration::from_millis(u64::from(config.blink_interval_ms));
    let panel_renderer = spawn_renderer(Arc::clone(&panel), blink_interval, "panel-blink\0")?;
    let control_renderer =
        spawn_renderer(Arc::clone(&control), blink_interval, "control-blink\0")?;

    // ── 4. Pattern from NVS (or default) ──────────────────────
    let mut nvs = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::unavailable()
    });
    let pattern = Pattern::load_or_default(&nvs);

    let mut lamps = PanelHardware::new(
        Arc::clone(&panel),
        Arc::clone(&control),
        FreeRtos,
        &config,
    );
    if let Err(e) = lamps.lamp_test() {
        warn!("Lamp test failed: {}", e);
    }

    // ── 5. Button edges ───────────────────────────────────────
    hw_init::init_button_inputs()?;
    hw_init::init_isr_service()?;

    // ── 6. Operator interrupt on the console ──────────────────
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        task_pin::spawn_on_core(Core::Pro, CONSOLE_PRIORITY, 3, "console\0", move || {
            let mut byte = [0u8; 1];
            let mut stdin = std::io::stdin();
            while !flag.load(Ordering::Acquire) {
                match stdin.read(&mut byte) {
                    Ok(1) if byte[0] == INTERRUPT_BYTE => {
                        flag.store(true, Ordering::Release);
                    }
                    Ok(0) | Err(_) => std::thread::sleep(Duration::from_millis(100)),
                    Ok(_) => {}
                }
            }
        })
        .context("console thread")?;
    }

    // ── 7. Session ────────────────────────────────────────────
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);
    let mut monitor = InputMonitor::new(&config);
    let mut log_sink = LogEventSink::new();
    let mut app = SessionService::new(config.clone(), pattern);
    app.start(&mut lamps, &mut log_sink);

    info!("System ready. Entering main loop.");

    let loop_interval = Duration::from_millis(u64::from(config.loop_interval_ms));
    while !interrupted.load(Ordering::Acquire) {
        let snapshot = match panel.read_inputs(config.inputs_active_low) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Panel read failed: {}", e);
                None
            }
        };

        app.poll(
            &mut monitor,
            &BUTTON_EDGES,
            snapshot,
            &mut lamps,
            &mut nvs,
            &mut log_sink,
        );

        watchdog.feed();
        std::thread::sleep(loop_interval);
    }

    // ── 8. Shutdown ───────────────────────────────────────────
    info!("Interrupted, shutting down");
    if let Err(e) = lamps.all_off() {
        error!("Failed to switch lamps off: {}", e);
    }
    hw_init::detach_isr_service();
    panel_renderer.stop();
    control_renderer.stop();
    watchdog.release();
    info!("Shutdown complete");
    Ok(())
}
