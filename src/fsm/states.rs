//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  Handlers render the state's lamp frame on
//! every tick, so a frame that failed to reach the hardware is simply
//! rendered again.
//!
//! ```text
//!  RESET ──[select]──▶ DO ──[back]──▶ PAUSE ──[long hold]──▶ RESET
//!  RESET ──[up/down]──▶ CHANGERANGE ──[up/down]──▶ CHANGERANGE
//!  CHANGERANGE ──[select]──▶ CHANGERANGE_DONE ──[next tick]──▶ RESET
//! ```

use super::context::{Effect, SessionContext};
use super::{StateDescriptor, StateId};
use crate::app::events::SessionEvent;
use crate::drivers::blink::{FlashMode, LampStatus};
use crate::drivers::button::Button;
use crate::pins::PANEL_CHANNEL_COUNT;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — None (behaves as Reset)
        StateDescriptor {
            id: StateId::None,
            name: "NONE",
            on_enter: Some(reset_enter),
            on_exit: None,
            on_update: reset_update,
        },
        // Index 1 — Reset
        StateDescriptor {
            id: StateId::Reset,
            name: "RESET",
            on_enter: Some(reset_enter),
            on_exit: None,
            on_update: reset_update,
        },
        // Index 2 — Pause
        StateDescriptor {
            id: StateId::Pause,
            name: "PAUSE",
            on_enter: Some(pause_render),
            on_exit: None,
            on_update: pause_update,
        },
        // Index 3 — Do
        StateDescriptor {
            id: StateId::Do,
            name: "DO",
            on_enter: Some(do_enter),
            on_exit: None,
            on_update: do_update,
        },
        // Index 4 — ChangeRange
        StateDescriptor {
            id: StateId::ChangeRange,
            name: "CHANGERANGE",
            on_enter: Some(change_range_render),
            on_exit: None,
            on_update: change_range_update,
        },
        // Index 5 — ChangeRangeDone
        StateDescriptor {
            id: StateId::ChangeRangeDone,
            name: "CHANGERANGE_DONE",
            on_enter: Some(change_range_done_enter),
            on_exit: None,
            on_update: change_range_done_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESET / NONE
// ═══════════════════════════════════════════════════════════════════════════

fn reset_enter(ctx: &mut SessionContext) {
    reset_render(ctx);
    info!("RESET: waiting for select (start) or up/down (edit range)");
}

fn reset_render(ctx: &mut SessionContext) {
    ctx.progress = 0;
    ctx.frame.back = LampStatus::Off;
    ctx.frame.pause = LampStatus::On;
    ctx.frame.panel = [LampStatus::Off; PANEL_CHANNEL_COUNT];
}

fn reset_update(ctx: &mut SessionContext) -> Option<StateId> {
    reset_render(ctx);
    match ctx.take_press() {
        Some(Button::Select) => Some(StateId::Do),
        Some(button @ (Button::Up | Button::Down)) => {
            // The press that opens the editor is also its first edit.
            edit_range(ctx, button);
            Some(StateId::ChangeRange)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DO: the operator presses the pattern in order
// ═══════════════════════════════════════════════════════════════════════════

fn do_enter(ctx: &mut SessionContext) {
    ctx.progress = 0;
    ctx.target_mode = LampStatus::BlinkMed;
    ctx.wrong_latched = false;
    do_render(ctx);
    info!("DO: pattern {:?}", ctx.pattern.as_slice());
}

fn do_update(ctx: &mut SessionContext) -> Option<StateId> {
    if ctx.take_press() == Some(Button::Back) {
        return Some(StateId::Pause);
    }

    if let Some(snapshot) = ctx.snapshot.take() {
        let pressed = snapshot.pressed_mask();
        // A correct press stays excused until its button is released.
        ctx.held_correct &= pressed;

        if let Some(target) = ctx.target() {
            if snapshot.is_pressed(target) {
                advance(ctx, target);
            } else if pressed & !ctx.held_correct != 0 {
                if !ctx.wrong_latched {
                    debug!("DO: wrong press 0b{:08b}, target {}", pressed, target);
                    ctx.emit(SessionEvent::WrongButton { target, pressed });
                }
                ctx.target_mode = LampStatus::BlinkShort;
                ctx.wrong_latched = true;
            } else {
                ctx.wrong_latched = false;
            }
        }
    }

    do_render(ctx);
    None
}

fn advance(ctx: &mut SessionContext, channel: u8) {
    ctx.held_correct |= 1 << channel;
    ctx.progress += 1;
    ctx.target_mode = LampStatus::BlinkMed;
    ctx.wrong_latched = false;

    let len = ctx.pattern.len();
    ctx.emit(SessionEvent::Advanced {
        step: ctx.progress as u8,
        of: len as u8,
        channel,
    });

    if ctx.progress >= len {
        info!("DO: pattern complete");
        let hold = ctx.config.complete_hold_ms;
        ctx.push_effect(Effect::LightPattern(LampStatus::On));
        ctx.push_effect(Effect::Hold(hold));
        ctx.push_effect(Effect::Flash(FlashMode::SweepUp));
        ctx.push_effect(Effect::ClearPanel);
        ctx.emit(SessionEvent::RoundComplete { length: len as u8 });
        ctx.progress = 0;
    }
}

fn do_render(ctx: &mut SessionContext) {
    ctx.frame.back = LampStatus::On;
    ctx.frame.pause = LampStatus::Off;

    let mut panel = [LampStatus::Off; PANEL_CHANNEL_COUNT];
    for ch in ctx.pattern.iter().take(ctx.progress) {
        panel[usize::from(ch)] = LampStatus::On;
    }
    if let Some(target) = ctx.target() {
        panel[usize::from(target)] = ctx.target_mode;
    }
    ctx.frame.panel = panel;
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSE: panel frozen, long hold on back returns to RESET
// ═══════════════════════════════════════════════════════════════════════════

fn pause_render(ctx: &mut SessionContext) {
    ctx.frame.back = LampStatus::Off;
    ctx.frame.pause = LampStatus::BlinkMed;
}

fn pause_update(ctx: &mut SessionContext) -> Option<StateId> {
    pause_render(ctx);
    if ctx.take_long_hold() {
        return Some(StateId::Reset);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHANGERANGE: up/down resize the pattern, select confirms
// ═══════════════════════════════════════════════════════════════════════════

fn change_range_render(ctx: &mut SessionContext) {
    ctx.frame.back = LampStatus::BlinkMed;
    let len = ctx.pattern.len();
    // The first `len` channels by position, not the configured indices.
    ctx.frame.panel = core::array::from_fn(|i| {
        if i < len {
            LampStatus::BlinkMed
        } else {
            LampStatus::Off
        }
    });
}

fn change_range_update(ctx: &mut SessionContext) -> Option<StateId> {
    let next = match ctx.take_press() {
        Some(Button::Select) => Some(StateId::ChangeRangeDone),
        Some(button @ (Button::Up | Button::Down)) => {
            edit_range(ctx, button);
            None
        }
        _ => None,
    };
    change_range_render(ctx);
    next
}

fn edit_range(ctx: &mut SessionContext, button: Button) {
    let changed = match button {
        Button::Up => ctx.pattern.extend(),
        Button::Down => ctx.pattern.shrink(),
        _ => false,
    };
    if changed {
        ctx.emit(SessionEvent::RangeEdited {
            length: ctx.pattern.len() as u8,
            last: ctx.pattern.last(),
        });
    } else {
        debug!("CHANGERANGE: {} ignored at bound", button.name());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHANGERANGE_DONE: confirm, persist, back to RESET after one tick
// ═══════════════════════════════════════════════════════════════════════════

fn change_range_done_enter(ctx: &mut SessionContext) {
    info!("CHANGERANGE_DONE: confirming {:?}", ctx.pattern.as_slice());
    let hold = ctx.config.confirm_hold_ms;
    ctx.push_effect(Effect::LightPattern(LampStatus::BlinkShort));
    ctx.push_effect(Effect::Hold(hold));
    ctx.push_effect(Effect::Flash(FlashMode::Blink));
    ctx.push_effect(Effect::ClearPanel);
    ctx.push_effect(Effect::SavePattern);
    ctx.frame.panel = [LampStatus::Off; PANEL_CHANNEL_COUNT];
}

fn change_range_done_update(_ctx: &mut SessionContext) -> Option<StateId> {
    Some(StateId::Reset)
}
