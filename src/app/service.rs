//! Session service — the hexagonal core.
//!
//! [`SessionService`] owns the FSM and its shared context.  It exposes a
//! clean, hardware-agnostic API.  All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  EdgeQueue ──▶ InputMonitor ──▶ ┌──────────────────┐ ──▶ EventSink
//!  InputSnapshot ───────────────▶ │  SessionService  │ ──▶ LampPort
//!                                 │   FSM · context  │ ◀─▶ PatternStore
//!                                 └──────────────────┘
//! ```
//!
//! ## Lamp rendering
//!
//! State handlers describe a whole [`LampFrame`] every tick.  The service
//! diffs it against the frame last confirmed on the hardware and writes
//! only the lamps that changed.  Any failed write, and any blocking
//! effect, invalidates the confirmed frame so the next iteration writes
//! every lamp again.

use core::mem;

use log::{info, warn};

use crate::config::DeviceConfig;
use crate::drivers::blink::LampStatus;
use crate::drivers::button::{ButtonEvent, EdgeQueue, InputMonitor};
use crate::drivers::expander::InputSnapshot;
use crate::error::Error;
use crate::fsm::context::{Effect, LampFrame, SessionContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::pattern::Pattern;

use super::events::SessionEvent;
use super::ports::{ControlLamp, EventSink, LampPort, PatternStore};

// ───────────────────────────────────────────────────────────────
// SessionService
// ───────────────────────────────────────────────────────────────

/// The session service orchestrates all training-session logic.
pub struct SessionService {
    fsm: Fsm,
    ctx: SessionContext,
    /// Frame last confirmed on the hardware; `None` forces a full redraw.
    shown: Option<LampFrame>,
    /// A lamp fault was already reported and not yet cleared.
    lamp_fault: bool,
}

impl SessionService {
    /// Construct the service from configuration and the loaded pattern.
    ///
    /// Does **not** start the FSM — call [`start`](Self::start) next.
    pub fn new(config: DeviceConfig, pattern: Pattern) -> Self {
        let ctx = SessionContext::new(config, pattern);
        let fsm = Fsm::new(build_state_table(), StateId::Reset);
        Self {
            fsm,
            ctx,
            shown: None,
            lamp_fault: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in RESET and draw its frame.
    pub fn start(&mut self, lamps: &mut impl LampPort, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&SessionEvent::Started(self.fsm.current_state()));
        info!(
            "SessionService started in {} with pattern {:?}",
            self.fsm.current_state().name(),
            self.ctx.pattern.as_slice()
        );
        self.render(lamps, sink);
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run one main-loop iteration: drain edges → events → FSM, then one
    /// FSM tick with the fresh panel snapshot.
    ///
    /// `snapshot` is `None` when the input read failed; DO then waits for
    /// the next iteration.
    pub fn poll(
        &mut self,
        monitor: &mut InputMonitor,
        edges: &EdgeQueue,
        snapshot: Option<InputSnapshot>,
        lamps: &mut impl LampPort,
        store: &mut impl PatternStore,
        sink: &mut impl EventSink,
    ) {
        while let Some(raw) = edges.pop() {
            let paused = self.fsm.current_state() == StateId::Pause;
            if let Some(event) = monitor.process(raw, paused) {
                self.handle_event(event, lamps, store, sink);
            }
        }
        self.tick(snapshot, lamps, store, sink);
    }

    /// Feed one classified button event through the FSM.
    pub fn handle_event(
        &mut self,
        event: ButtonEvent,
        lamps: &mut impl LampPort,
        store: &mut impl PatternStore,
        sink: &mut impl EventSink,
    ) {
        self.ctx.event = Some(event);
        self.step(lamps, store, sink);
    }

    /// Evaluate the current state against a panel snapshot.
    pub fn tick(
        &mut self,
        snapshot: Option<InputSnapshot>,
        lamps: &mut impl LampPort,
        store: &mut impl PatternStore,
        sink: &mut impl EventSink,
    ) {
        self.ctx.snapshot = snapshot;
        self.step(lamps, store, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn pattern(&self) -> &Pattern {
        &self.ctx.pattern
    }

    pub fn progress(&self) -> usize {
        self.ctx.progress
    }

    /// The frame the current state wants shown.
    pub fn frame(&self) -> &LampFrame {
        &self.ctx.frame
    }

    // ── Internal ──────────────────────────────────────────────

    fn step(
        &mut self,
        lamps: &mut impl LampPort,
        store: &mut impl PatternStore,
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        // Whatever the handler did not take is dropped.
        self.ctx.event = None;
        self.ctx.snapshot = None;

        for event in &mem::take(&mut self.ctx.outbox) {
            sink.emit(event);
        }
        let next = self.fsm.current_state();
        if next != prev {
            sink.emit(&SessionEvent::StateChanged {
                from: prev,
                to: next,
            });
        }

        self.run_effects(lamps, store, sink);
        self.render(lamps, sink);
    }

    fn run_effects(
        &mut self,
        lamps: &mut impl LampPort,
        store: &mut impl PatternStore,
        sink: &mut impl EventSink,
    ) {
        let effects = mem::take(&mut self.ctx.effects);
        if effects.is_empty() {
            return;
        }
        // Effects drive lamps behind the frame cache.
        self.shown = None;

        for effect in &effects {
            let result = match *effect {
                Effect::LightPattern(status) => self
                    .ctx
                    .pattern
                    .iter()
                    .try_for_each(|ch| lamps.set_panel(ch, status)),
                Effect::Hold(ms) => {
                    lamps.hold(ms);
                    Ok(())
                }
                Effect::Flash(mode) => lamps.flash(mode),
                Effect::ClearPanel => lamps.set_all_panel(LampStatus::Off),
                Effect::SavePattern => {
                    self.save_pattern(store, sink);
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!("effect {:?} failed: {}", effect, e);
                self.report_lamp_fault(e, sink);
            }
        }
    }

    fn save_pattern(&mut self, store: &mut impl PatternStore, sink: &mut impl EventSink) {
        let length = self.ctx.pattern.len() as u8;
        match store.save_pattern(self.ctx.pattern.as_slice()) {
            Ok(()) => {
                info!("pattern saved: {:?}", self.ctx.pattern.as_slice());
                sink.emit(&SessionEvent::PatternSaved { length });
            }
            Err(e) => {
                warn!("pattern save failed: {}", e);
                sink.emit(&SessionEvent::PatternSaveFailed(e));
            }
        }
    }

    fn render(&mut self, lamps: &mut impl LampPort, sink: &mut impl EventSink) {
        let frame = self.ctx.frame;
        let shown = self.shown;
        let mut first_error: Option<Error> = None;

        for (ch, &status) in frame.panel.iter().enumerate() {
            if shown.map(|s| s.panel[ch]) != Some(status) {
                if let Err(e) = lamps.set_panel(ch as u8, status) {
                    first_error.get_or_insert(e);
                }
            }
        }
        for (lamp, status, was) in [
            (ControlLamp::Back, frame.back, shown.map(|s| s.back)),
            (ControlLamp::Pause, frame.pause, shown.map(|s| s.pause)),
        ] {
            if was != Some(status) {
                if let Err(e) = lamps.set_control(lamp, status) {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => {
                self.shown = Some(frame);
                self.lamp_fault = false;
            }
            Some(e) => {
                self.shown = None;
                self.report_lamp_fault(e, sink);
            }
        }
    }

    /// Report the first fault of a run of failures; stay quiet until a
    /// render succeeds again.
    fn report_lamp_fault(&mut self, error: Error, sink: &mut impl EventSink) {
        if !self.lamp_fault {
            warn!("lamp write failed: {}", error);
            sink.emit(&SessionEvent::LampFault(error));
            self.lamp_fault = true;
        }
    }
}
