//! System-wide constants. Kept separate from [`crate::config`] because these
//! are protocol/queue invariants, not per-machine tunables.

use static_assertions::const_assert;

/// Capacity of the bounded command queue (spec §4.7: "Bounded ring of 8 records").
pub const QUEUE_CAPACITY: usize = 8;

/// Maximum accepted input line length, not counting the terminator.
pub const LINE_MAX: usize = 64;

/// Line buffer size: exactly `LINE_MAX`, so the 65th byte's `push` fails and
/// triggers the overflow path instead of being silently accepted as part of
/// the line.
pub const LINE_BUF_LEN: usize = LINE_MAX;

/// Debounce window for endstop state changes.
pub const DEFAULT_ENDSTOP_DEBOUNCE_MS: u32 = 10;

/// Hardware watchdog window. Unfed past this, the device resets.
pub const WATCHDOG_WINDOW_MS: u32 = 8_000;

/// Cadence at which the motion executor recomputes instantaneous speed.
pub const MOTION_TICK_MS: u32 = 5;

/// Cadence at which the UI is ticked while the dispatcher blocks on a long
/// motion or homing operation.
pub const UI_TICK_DURING_MOTION_MS: u32 = 150;

/// Default per-phase homing timeout.
pub const DEFAULT_HOMING_TIMEOUT_S: u32 = 60;

/// Floor applied to every axis' seated speed during a composite move, as a
/// fraction of the dominant axis' max speed (spec §4.4 step 3).
pub const MIN_SPEED_FRACTION: f32 = 0.05;

/// Absolute floor on seated speed in steps/s, regardless of the fractional
/// floor above, so a very slow dominant axis never seats a near-zero speed
/// on a faster companion axis.
pub const MIN_SPEED_STEPS_PER_S: f32 = 50.0;

const_assert!(QUEUE_CAPACITY > 0);
const_assert!(LINE_MAX > 0);
const_assert!(LINE_BUF_LEN == LINE_MAX);
