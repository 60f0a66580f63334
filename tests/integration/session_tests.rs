//! Integration tests for the SessionService → FSM → lamps pipeline.
//!
//! These run on the host and drive whole sessions through the service,
//! the way the main loop does, with mock lamps, store and sink.

use super::mock_hw::{long_hold, press, CollectSink, LampCall, MockLamps, MockStore};

use pokayoke::app::events::SessionEvent;
use pokayoke::app::ports::StorageError;
use pokayoke::app::service::SessionService;
use pokayoke::config::DeviceConfig;
use pokayoke::drivers::blink::{FlashMode, LampStatus};
use pokayoke::drivers::button::{Button, Edge, EdgeQueue, InputMonitor, RawEdge};
use pokayoke::drivers::expander::InputSnapshot;
use pokayoke::fsm::StateId;
use pokayoke::pattern::Pattern;

struct Rig {
    app: SessionService,
    lamps: MockLamps,
    store: MockStore,
    sink: CollectSink,
}

impl Rig {
    fn new() -> Self {
        Self::with_pattern(Pattern::default())
    }

    fn with_pattern(pattern: Pattern) -> Self {
        let mut rig = Self {
            app: SessionService::new(DeviceConfig::default(), pattern),
            lamps: MockLamps::new(),
            store: MockStore::new(),
            sink: CollectSink::new(),
        };
        rig.app.start(&mut rig.lamps, &mut rig.sink);
        rig
    }

    fn press(&mut self, button: Button) {
        self.app.handle_event(
            press(button, 0),
            &mut self.lamps,
            &mut self.store,
            &mut self.sink,
        );
    }

    fn long_hold(&mut self) {
        self.app
            .handle_event(long_hold(0), &mut self.lamps, &mut self.store, &mut self.sink);
    }

    fn snapshot(&mut self, pressed: u8) {
        self.app.tick(
            Some(InputSnapshot::from_pressed(pressed)),
            &mut self.lamps,
            &mut self.store,
            &mut self.sink,
        );
    }

    fn idle(&mut self) {
        self.app
            .tick(None, &mut self.lamps, &mut self.store, &mut self.sink);
    }

    fn wrong_presses(&self) -> usize {
        self.sink
            .count(|e| matches!(e, SessionEvent::WrongButton { .. }))
    }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_shows_reset_frame() {
    let rig = Rig::new();
    assert_eq!(rig.app.state(), StateId::Reset);
    assert_eq!(rig.sink.events[0], SessionEvent::Started(StateId::Reset));
    assert_eq!(rig.lamps.pause, LampStatus::On);
    assert_eq!(rig.lamps.back, LampStatus::Off);
    assert_eq!(rig.lamps.panel, [LampStatus::Off; 8]);
}

#[test]
fn select_starts_round_with_first_target_blinking() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    assert_eq!(rig.app.state(), StateId::Do);
    assert_eq!(rig.lamps.back, LampStatus::On);
    assert_eq!(rig.lamps.pause, LampStatus::Off);
    assert_eq!(rig.lamps.panel[0], LampStatus::BlinkMed);
    assert!(rig.sink.events.contains(&SessionEvent::StateChanged {
        from: StateId::Reset,
        to: StateId::Do,
    }));
}

// ── DO: correct and wrong presses ─────────────────────────────

#[test]
fn correct_press_lights_channel_and_moves_target() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b0000_0001);

    assert_eq!(rig.app.progress(), 1);
    assert_eq!(rig.lamps.panel[0], LampStatus::On);
    assert_eq!(rig.lamps.panel[1], LampStatus::BlinkMed);
    assert!(rig.sink.events.contains(&SessionEvent::Advanced {
        step: 1,
        of: 4,
        channel: 0,
    }));
}

#[test]
fn wrong_press_blinks_target_fast_and_keeps_progress() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b0010_0000);

    assert_eq!(rig.app.progress(), 0);
    assert_eq!(rig.lamps.panel[0], LampStatus::BlinkShort);
    assert_eq!(rig.lamps.panel[5], LampStatus::Off);
    assert_eq!(rig.wrong_presses(), 1);
}

#[test]
fn wrong_press_is_reported_once_per_hold() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    for _ in 0..5 {
        rig.snapshot(0b0010_0000);
    }
    assert_eq!(rig.wrong_presses(), 1);

    rig.snapshot(0);
    rig.snapshot(0b0010_0000);
    assert_eq!(rig.wrong_presses(), 2);
}

#[test]
fn correct_press_after_wrong_press_restores_normal_blink() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b1000_0000);
    rig.snapshot(0);
    rig.snapshot(0b0000_0001);

    assert_eq!(rig.app.progress(), 1);
    assert_eq!(rig.lamps.panel[1], LampStatus::BlinkMed);
}

#[test]
fn still_held_correct_button_is_not_a_wrong_press() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b0000_0001);
    // Channel 0 still down while the operator reaches for channel 1.
    rig.snapshot(0b0000_0001);
    rig.snapshot(0b0000_0011);

    assert_eq!(rig.wrong_presses(), 0);
    assert_eq!(rig.app.progress(), 2);
}

#[test]
fn released_then_repressed_correct_button_counts_as_wrong() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b0000_0001);
    rig.snapshot(0);
    rig.snapshot(0b0000_0001);

    assert_eq!(rig.wrong_presses(), 1);
    assert_eq!(rig.app.progress(), 1);
}

#[test]
fn no_snapshot_means_no_evaluation() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.idle();
    rig.idle();
    assert_eq!(rig.app.progress(), 0);
    assert_eq!(rig.lamps.panel[0], LampStatus::BlinkMed);
}

// ── DO: round completion ──────────────────────────────────────

#[test]
fn completing_round_runs_choreography_and_restarts() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    for ch in 0..3 {
        rig.snapshot(1 << ch);
    }
    rig.lamps.clear();
    rig.snapshot(1 << 3);

    let hold = DeviceConfig::default().complete_hold_ms;
    assert_eq!(
        &rig.lamps.calls[..7],
        &[
            LampCall::Panel(0, LampStatus::On),
            LampCall::Panel(1, LampStatus::On),
            LampCall::Panel(2, LampStatus::On),
            LampCall::Panel(3, LampStatus::On),
            LampCall::Hold(hold),
            LampCall::Flash(FlashMode::SweepUp),
            LampCall::AllPanel(LampStatus::Off),
        ]
    );
    assert_eq!(rig.app.progress(), 0);
    assert_eq!(rig.app.state(), StateId::Do);
    assert!(rig.sink.events.contains(&SessionEvent::RoundComplete { length: 4 }));

    // The panel was fully redrawn for the new round.
    let mut expected = [LampStatus::Off; 8];
    expected[0] = LampStatus::BlinkMed;
    assert_eq!(rig.lamps.panel, expected);
    assert_eq!(rig.lamps.back, LampStatus::On);
}

#[test]
fn last_button_held_through_restart_is_excused() {
    let mut rig = Rig::with_pattern(Pattern::from_slice(&[0, 1]).unwrap());
    rig.press(Button::Select);
    rig.snapshot(0b01);
    rig.snapshot(0b10);
    assert!(rig.sink.events.contains(&SessionEvent::RoundComplete { length: 2 }));

    rig.snapshot(0b10);
    rig.snapshot(0b10);
    assert_eq!(rig.wrong_presses(), 0);

    rig.snapshot(0);
    rig.snapshot(0b01);
    assert_eq!(rig.app.progress(), 1);
}

#[test]
fn stored_repeated_channel_cannot_complete_on_one_hold() {
    let pattern = Pattern::load_or_default(&MockStore::with(&[3, 3]));
    assert_eq!(pattern, Pattern::default());

    let mut rig = Rig::with_pattern(pattern);
    rig.press(Button::Select);
    rig.snapshot(0b0000_0001);
    rig.snapshot(0b0000_0001);

    assert_eq!(rig.app.progress(), 1);
    assert!(!rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, SessionEvent::RoundComplete { .. })));
}

// ── PAUSE ─────────────────────────────────────────────────────

#[test]
fn back_pauses_and_freezes_panel() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.snapshot(0b0000_0001);
    let panel_before = rig.lamps.panel;

    rig.press(Button::Back);
    assert_eq!(rig.app.state(), StateId::Pause);
    assert_eq!(rig.lamps.back, LampStatus::Off);
    assert_eq!(rig.lamps.pause, LampStatus::BlinkMed);
    assert_eq!(rig.lamps.panel, panel_before);

    // Panel presses are ignored while paused.
    rig.snapshot(0b0000_0010);
    assert_eq!(rig.app.progress(), 1);
    rig.press(Button::Select);
    assert_eq!(rig.app.state(), StateId::Pause);
}

#[test]
fn long_hold_leaves_pause_for_reset() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.press(Button::Back);
    rig.long_hold();

    assert_eq!(rig.app.state(), StateId::Reset);
    assert_eq!(rig.lamps.pause, LampStatus::On);
    assert_eq!(rig.lamps.panel, [LampStatus::Off; 8]);
}

#[test]
fn long_hold_outside_pause_is_ignored() {
    let mut rig = Rig::new();
    rig.press(Button::Select);
    rig.long_hold();
    assert_eq!(rig.app.state(), StateId::Do);
}

// ── CHANGERANGE ───────────────────────────────────────────────

#[test]
fn up_and_down_cancel_out() {
    let mut rig = Rig::new();
    for _ in 0..3 {
        rig.press(Button::Up);
    }
    for _ in 0..3 {
        rig.press(Button::Down);
    }
    assert_eq!(rig.app.state(), StateId::ChangeRange);
    assert_eq!(rig.app.pattern().as_slice(), &[0, 1, 2, 3]);
}

#[test]
fn editor_shows_length_by_position() {
    let mut rig = Rig::with_pattern(Pattern::from_slice(&[4, 5, 6]).unwrap());
    rig.press(Button::Up);

    assert_eq!(rig.app.pattern().as_slice(), &[4, 5, 6, 7]);
    assert_eq!(rig.lamps.back, LampStatus::BlinkMed);
    for ch in 0..4 {
        assert_eq!(rig.lamps.panel[ch], LampStatus::BlinkMed);
    }
    for ch in 4..8 {
        assert_eq!(rig.lamps.panel[ch], LampStatus::Off);
    }
}

#[test]
fn editor_stops_at_bounds() {
    let mut rig = Rig::new();
    for _ in 0..10 {
        rig.press(Button::Down);
    }
    assert_eq!(rig.app.pattern().len(), Pattern::MIN_LEN);
    for _ in 0..10 {
        rig.press(Button::Up);
    }
    assert_eq!(rig.app.pattern().len(), Pattern::MAX_LEN);
    assert_eq!(rig.app.pattern().last(), 7);
}

#[test]
fn confirming_range_saves_and_returns_to_reset() {
    let mut rig = Rig::new();
    rig.press(Button::Up);
    rig.lamps.clear();
    rig.press(Button::Select);

    assert_eq!(rig.app.state(), StateId::ChangeRangeDone);
    let hold = DeviceConfig::default().confirm_hold_ms;
    assert!(rig.lamps.calls.contains(&LampCall::Panel(4, LampStatus::BlinkShort)));
    assert!(rig.lamps.calls.contains(&LampCall::Hold(hold)));
    assert_eq!(rig.lamps.flashes(), vec![FlashMode::Blink]);
    assert_eq!(rig.store.stored.as_deref(), Some(&[0, 1, 2, 3, 4][..]));
    assert!(rig.sink.events.contains(&SessionEvent::PatternSaved { length: 5 }));

    rig.idle();
    assert_eq!(rig.app.state(), StateId::Reset);
}

#[test]
fn failed_save_keeps_session_going() {
    let mut rig = Rig::new();
    rig.store.fail_with = Some(StorageError::Full);
    rig.press(Button::Up);
    rig.press(Button::Select);

    assert!(rig
        .sink
        .events
        .contains(&SessionEvent::PatternSaveFailed(StorageError::Full)));
    assert_eq!(rig.app.pattern().len(), 5);
    assert_eq!(rig.store.stored, None);

    rig.idle();
    rig.press(Button::Select);
    assert_eq!(rig.app.state(), StateId::Do);
}

// ── Lamp faults ───────────────────────────────────────────────

#[test]
fn lamp_fault_is_reported_once_and_frame_reapplied() {
    let mut rig = Rig::new();
    rig.lamps.offline = true;
    rig.press(Button::Select);
    rig.idle();
    rig.idle();
    let faults = |sink: &CollectSink| sink.count(|e| matches!(e, SessionEvent::LampFault(_)));
    assert_eq!(faults(&rig.sink), 1);

    rig.lamps.offline = false;
    rig.idle();
    assert_eq!(rig.lamps.back, LampStatus::On);
    assert_eq!(rig.lamps.pause, LampStatus::Off);
    assert_eq!(rig.lamps.panel[0], LampStatus::BlinkMed);

    rig.lamps.offline = true;
    rig.press(Button::Back);
    assert_eq!(faults(&rig.sink), 2);
}

// ── Edge queue path (as the main loop drives it) ──────────────

fn edge(button: Button, edge: Edge, at_ms: u32) -> RawEdge {
    RawEdge { button, edge, at_ms }
}

struct LoopRig {
    rig: Rig,
    monitor: InputMonitor,
    edges: EdgeQueue,
}

impl LoopRig {
    fn new() -> Self {
        Self {
            rig: Rig::new(),
            monitor: InputMonitor::new(&DeviceConfig::default()),
            edges: EdgeQueue::new(),
        }
    }

    fn push(&self, button: Button, e: Edge, at_ms: u32) {
        assert!(self.edges.push_from_isr(edge(button, e, at_ms)));
    }

    fn poll(&mut self, pressed: Option<u8>) {
        let r = &mut self.rig;
        r.app.poll(
            &mut self.monitor,
            &self.edges,
            pressed.map(InputSnapshot::from_pressed),
            &mut r.lamps,
            &mut r.store,
            &mut r.sink,
        );
    }

    /// Select → DO, then back → PAUSE.
    fn into_pause(&mut self) {
        self.push(Button::Select, Edge::Rising, 1_000);
        self.push(Button::Select, Edge::Falling, 1_150);
        self.poll(None);
        self.push(Button::Back, Edge::Rising, 2_000);
        self.push(Button::Back, Edge::Falling, 2_150);
        self.poll(None);
        assert_eq!(self.rig.app.state(), StateId::Pause);
    }
}

#[test]
fn long_hold_in_window_resets() {
    let mut lr = LoopRig::new();
    lr.into_pause();

    lr.push(Button::Back, Edge::Rising, 10_000);
    lr.poll(None);
    assert!(lr.monitor.hold_armed());
    lr.push(Button::Back, Edge::Falling, 11_200);
    lr.poll(None);
    assert_eq!(lr.rig.app.state(), StateId::Reset);
}

#[test]
fn short_hold_stays_paused() {
    let mut lr = LoopRig::new();
    lr.into_pause();

    lr.push(Button::Back, Edge::Rising, 10_000);
    lr.push(Button::Back, Edge::Falling, 10_300);
    lr.poll(None);
    assert_eq!(lr.rig.app.state(), StateId::Pause);
}

#[test]
fn bounces_do_not_double_press() {
    let mut lr = LoopRig::new();
    lr.push(Button::Up, Edge::Rising, 1_000);
    lr.push(Button::Up, Edge::Falling, 1_020);
    lr.push(Button::Up, Edge::Rising, 1_040);
    lr.poll(None);
    assert_eq!(lr.rig.app.state(), StateId::ChangeRange);
    assert_eq!(lr.rig.app.pattern().len(), 5);
}

#[test]
fn snapshot_is_evaluated_after_queued_edges() {
    let mut lr = LoopRig::new();
    lr.push(Button::Select, Edge::Rising, 1_000);
    lr.poll(Some(0b0000_0001));
    assert_eq!(lr.rig.app.state(), StateId::Do);
    assert_eq!(lr.rig.app.progress(), 1);
}
