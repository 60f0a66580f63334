//! GPIO / peripheral pin assignments for the trainer main board.
//!
//! The button lines are configured through raw GPIO numbers, so they live
//! here.  Pins that are claimed as typed esp-idf-hal peripherals in
//! `main.rs` are only listed:
//!
//! | Function              | GPIO       |
//! |-----------------------|------------|
//! | Back lamp             | 4          |
//! | Pause lamp            | 5          |
//! | Spare lamps           | 6, 7       |
//! | I²C SDA / SCL (panel) | 14 / 15    |

// ---------------------------------------------------------------------------
// Control lamps (directly wired, active HIGH)
// ---------------------------------------------------------------------------

/// Number of directly-wired lamp channels.
pub const CONTROL_LAMP_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Control buttons (active LOW, internal pull-up, any-edge interrupt)
// ---------------------------------------------------------------------------

pub const BUTTON_SELECT_GPIO: i32 = 10;
pub const BUTTON_UP_GPIO: i32 = 11;
pub const BUTTON_DOWN_GPIO: i32 = 12;
/// Back / pause button.  Also the long-hold "go back" gesture.
pub const BUTTON_BACK_GPIO: i32 = 13;

/// Indexed by [`Button`](crate::drivers::button::Button) discriminant.
pub const BUTTON_GPIOS: [i32; 4] = [
    BUTTON_SELECT_GPIO,
    BUTTON_UP_GPIO,
    BUTTON_DOWN_GPIO,
    BUTTON_BACK_GPIO,
];

/// Number of expander-backed panel channels (port A outputs / port B inputs).
pub const PANEL_CHANNEL_COUNT: usize = 8;
