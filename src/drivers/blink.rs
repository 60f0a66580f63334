//! Lamp blink engine.
//!
//! An [`OutputChannel`] owns the logical status of a bank of up to eight
//! lamps and renders it to hardware.  Steady statuses (ON/OFF) are written
//! the moment they are set; blink statuses are only recorded, and a
//! background renderer calls [`OutputChannel::tick`] once per blink
//! interval to toggle them.
//!
//! ## Blink encoding
//!
//! A 3-bit phase counter advances by one per tick and wraps after 7.  A
//! blinking lamp is lit while its phase bit is set:
//!
//! | Status      | Phase bit | Toggles every |
//! |-------------|-----------|---------------|
//! | BLINK_SHORT | 0         | 1 tick        |
//! | BLINK_MED   | 1         | 2 ticks       |
//! | BLINK_LONG  | 2         | 4 ticks       |
//!
//! All lamps of one bank share the counter, so lamps with the same status
//! blink in lockstep.
//!
//! ## Locking
//!
//! Statuses are atomics; the backend sits behind one mutex per bank.  Both
//! `update` (for ON/OFF) and `tick` store or read statuses while holding
//! that mutex, so a tick can never render a status whose steady level has
//! not reached the hardware yet.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::drivers::expander::{InputSnapshot, Mcp23017};
use crate::drivers::task_pin::{self, Core};
use crate::error::{Error, Result};

/// Channel index meaning "every channel of the bank".
pub const ALL_CHANNELS: u8 = 0xff;

/// Renderer task priority (above the main loop, below the bus driver).
const RENDERER_PRIORITY: u8 = 6;
const RENDERER_STACK_KB: usize = 4;

// ── Status ────────────────────────────────────────────────────

/// Logical state of one lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LampStatus {
    #[default]
    Off = 0,
    On = 1,
    BlinkLong = 2,
    BlinkMed = 3,
    BlinkShort = 4,
}

impl LampStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::BlinkLong),
            3 => Some(Self::BlinkMed),
            4 => Some(Self::BlinkShort),
            _ => None,
        }
    }

    pub fn is_blink(self) -> bool {
        matches!(self, Self::BlinkLong | Self::BlinkMed | Self::BlinkShort)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::BlinkLong => "BLINK_LONG",
            Self::BlinkMed => "BLINK_MED",
            Self::BlinkShort => "BLINK_SHORT",
        }
    }
}

// ── Phase ─────────────────────────────────────────────────────

/// The shared 3-bit blink counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlinkPhase(u8);

impl BlinkPhase {
    pub fn new(v: u8) -> Self {
        Self(v & 0b111)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn advance(self) -> Self {
        Self::new(self.0.wrapping_add(1))
    }

    pub fn short(self) -> bool {
        self.0 & 0b001 != 0
    }

    pub fn medium(self) -> bool {
        self.0 & 0b010 != 0
    }

    pub fn long(self) -> bool {
        self.0 & 0b100 != 0
    }

    /// Physical level of a lamp holding `status` during this phase.
    pub fn level(self, status: LampStatus) -> bool {
        match status {
            LampStatus::Off => false,
            LampStatus::On => true,
            LampStatus::BlinkLong => self.long(),
            LampStatus::BlinkMed => self.medium(),
            LampStatus::BlinkShort => self.short(),
        }
    }
}

// ── Flash choreography ────────────────────────────────────────

/// Blocking whole-bank animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    /// Light channels 0→N-1 one by one, then extinguish them in the same order.
    SweepUp,
    /// As `SweepUp`, from N-1 down to 0.
    SweepDown,
    /// Whole bank on/off, `blink_repeats` times.
    Blink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashTiming {
    pub sweep_step_ms: u32,
    pub blink_step_ms: u32,
    pub blink_repeats: u8,
}

impl Default for FlashTiming {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for FlashTiming {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            sweep_step_ms: config.sweep_step_ms,
            blink_step_ms: config.blink_step_ms,
            blink_repeats: config.blink_repeats,
        }
    }
}

// ── Backend ───────────────────────────────────────────────────

/// Something that can drive up to eight lamp lines at once.
///
/// Bit `n` of `mask`/`levels` addresses channel `n`.
pub trait LampBackend: Send {
    /// Drive the lines selected by `mask` to the matching bits of `levels`;
    /// leave every other line alone.
    fn write_masked(&mut self, mask: u8, levels: u8) -> Result<()>;

    /// Drive every line at once.
    fn write_all(&mut self, levels: u8) -> Result<()> {
        self.write_masked(0xff, levels)
    }
}

// ── Output channel ────────────────────────────────────────────

/// A bank of `N` lamps (N ≤ 8) with a shared blink phase.
pub struct OutputChannel<B, const N: usize> {
    statuses: [AtomicU8; N],
    phase: AtomicU8,
    /// Set while `flash` owns the bank; `tick` renders nothing meanwhile.
    flashing: AtomicBool,
    backend: Mutex<B>,
}

impl<B: LampBackend, const N: usize> OutputChannel<B, N> {
    /// Mask covering every channel of the bank.
    pub const FULL_MASK: u8 = if N >= 8 { 0xff } else { (1u8 << N) - 1 };

    /// Wrap a backend; every status starts OFF.  The hardware is not
    /// touched until the first update or tick.
    pub fn new(backend: B) -> Self {
        const { assert!(N >= 1 && N <= 8, "a lamp bank has 1 to 8 channels") };
        Self {
            statuses: core::array::from_fn(|_| AtomicU8::new(LampStatus::Off as u8)),
            phase: AtomicU8::new(0),
            flashing: AtomicBool::new(false),
            backend: Mutex::new(backend),
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Set the status of one channel, or every channel with [`ALL_CHANNELS`].
    ///
    /// ON and OFF reach the hardware before this returns.  Blink statuses
    /// are only recorded; the renderer picks them up on its next tick.
    pub fn update(&self, channel: u8, status: LampStatus) -> Result<()> {
        let mask = Self::channel_mask(channel)?;
        match status {
            LampStatus::On | LampStatus::Off => {
                let level = if status == LampStatus::On { mask } else { 0 };
                let mut backend = self.lock();
                self.store(mask, status);
                if mask == Self::FULL_MASK {
                    backend.write_all(level)
                } else {
                    backend.write_masked(mask, level)
                }
            }
            _ => {
                self.store(mask, status);
                Ok(())
            }
        }
    }

    /// Advance the phase and render every blinking channel.
    pub fn tick(&self) -> Result<()> {
        let phase = self.advance_phase();
        let mut backend = self.lock();
        if self.flashing.load(Ordering::Acquire) {
            return Ok(());
        }
        let (mask, levels) = self.blink_levels(phase);
        if mask == 0 {
            return Ok(());
        }
        backend.write_masked(mask, levels)
    }

    /// Run a blocking animation over the whole bank, then restore the
    /// levels the recorded statuses call for.
    ///
    /// The renderer is held off for the duration.  The restore is attempted
    /// even when a step of the animation fails; the first error wins.
    pub fn flash(
        &self,
        mode: FlashMode,
        timing: &FlashTiming,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        let mut backend = self.lock();
        self.flashing.store(true, Ordering::Release);
        debug!("flash {:?} over {} channels", mode, N);

        let result = match mode {
            FlashMode::SweepUp => Self::sweep(&mut *backend, 0..N, timing, delay),
            FlashMode::SweepDown => Self::sweep(&mut *backend, (0..N).rev(), timing, delay),
            FlashMode::Blink => Self::blink_all(&mut *backend, timing, delay),
        };

        let restore = self.resync(&mut *backend);
        self.flashing.store(false, Ordering::Release);
        result.and(restore)
    }

    pub fn status(&self, channel: u8) -> Result<LampStatus> {
        let idx = usize::from(channel);
        if idx >= N {
            return Err(Error::InvalidChannel(channel));
        }
        Ok(self.load(idx))
    }

    pub fn statuses(&self) -> [LampStatus; N] {
        core::array::from_fn(|i| self.load(i))
    }

    pub fn phase(&self) -> BlinkPhase {
        BlinkPhase::new(self.phase.load(Ordering::Acquire))
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing.load(Ordering::Acquire)
    }

    /// Run `f` with exclusive access to the backend.
    pub fn with_backend<T>(&self, f: impl FnOnce(&mut B) -> T) -> T {
        let mut backend = self.lock();
        f(&mut backend)
    }

    // ── internals ─────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, B> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel_mask(channel: u8) -> Result<u8> {
        if channel == ALL_CHANNELS {
            Ok(Self::FULL_MASK)
        } else if usize::from(channel) < N {
            Ok(1 << channel)
        } else {
            Err(Error::InvalidChannel(channel))
        }
    }

    fn store(&self, mask: u8, status: LampStatus) {
        for (i, slot) in self.statuses.iter().enumerate() {
            if mask & (1 << i) != 0 {
                slot.store(status as u8, Ordering::Release);
            }
        }
    }

    fn load(&self, idx: usize) -> LampStatus {
        LampStatus::from_u8(self.statuses[idx].load(Ordering::Acquire)).unwrap_or_default()
    }

    fn advance_phase(&self) -> BlinkPhase {
        let prev = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| {
                Some(BlinkPhase::new(p).advance().value())
            })
            .unwrap_or_else(|p| p);
        BlinkPhase::new(prev).advance()
    }

    /// (mask of blinking channels, their levels for `phase`)
    fn blink_levels(&self, phase: BlinkPhase) -> (u8, u8) {
        let mut mask = 0u8;
        let mut levels = 0u8;
        for i in 0..N {
            let status = self.load(i);
            if status.is_blink() {
                mask |= 1 << i;
                if phase.level(status) {
                    levels |= 1 << i;
                }
            }
        }
        (mask, levels)
    }

    fn resync(&self, backend: &mut B) -> Result<()> {
        let phase = self.phase();
        let levels = (0..N)
            .filter(|&i| phase.level(self.load(i)))
            .fold(0u8, |acc, i| acc | (1 << i));
        backend.write_all(levels)
    }

    fn sweep(
        backend: &mut B,
        order: impl Iterator<Item = usize> + Clone,
        timing: &FlashTiming,
        delay: &mut impl DelayNs,
    ) -> Result<()> {
        let mut lit = 0u8;
        for i in order.clone() {
            lit |= 1 << i;
            backend.write_all(lit)?;
            delay.delay_ms(timing.sweep_step_ms);
        }
        for i in order {
            lit &= !(1 << i);
            backend.write_all(lit)?;
            delay.delay_ms(timing.sweep_step_ms);
        }
        Ok(())
    }

    fn blink_all(backend: &mut B, timing: &FlashTiming, delay: &mut impl DelayNs) -> Result<()> {
        for _ in 0..timing.blink_repeats {
            backend.write_all(Self::FULL_MASK)?;
            delay.delay_ms(timing.blink_step_ms);
            backend.write_all(0)?;
            delay.delay_ms(timing.blink_step_ms);
        }
        Ok(())
    }
}

impl<I2C: I2c + Send> OutputChannel<Mcp23017<I2C>, 8> {
    /// Read the expander's input bank.  Shares the bank mutex so the read
    /// never splits an output read-modify-write.
    pub fn read_inputs(&self, active_low: bool) -> Result<InputSnapshot> {
        let raw = self.with_backend(|expander| expander.read_inputs())?;
        Ok(InputSnapshot::from_raw(raw, active_low))
    }
}

// ── Renderer thread ───────────────────────────────────────────

/// Handle to a running renderer.  Dropping it without `stop()` leaves the
/// renderer running for the life of the process.
pub struct RendererHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl RendererHandle {
    /// Ask the renderer to exit and wait for it.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.join.join().is_err() {
            warn!("renderer '{}' panicked", self.name);
        } else {
            info!("renderer '{}' stopped", self.name);
        }
    }
}

/// Tick `channel` every `interval` on a core-pinned thread until stopped.
///
/// A failed tick is logged and the next one retries; the recorded statuses
/// stay authoritative.  `name` must be NUL-terminated.
pub fn spawn_renderer<B, const N: usize>(
    channel: Arc<OutputChannel<B, N>>,
    interval: Duration,
    name: &'static str,
) -> Result<RendererHandle>
where
    B: LampBackend + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let display = name.trim_end_matches('\0');

    let join = task_pin::spawn_on_core(
        Core::App,
        RENDERER_PRIORITY,
        RENDERER_STACK_KB,
        name,
        move || {
            while !stop_flag.load(Ordering::Acquire) {
                if let Err(e) = channel.tick() {
                    warn!("{}: tick failed: {}", display, e);
                }
                std::thread::sleep(interval);
            }
        },
    )
    .map_err(|e| {
        warn!("{}: spawn failed: {}", display, e);
        Error::Init("renderer thread spawn failed")
    })?;

    Ok(RendererHandle {
        name: display,
        stop,
        join,
    })
}
