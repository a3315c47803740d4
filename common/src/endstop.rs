//! Debounced endstop monitor (spec §4.1).

use crate::hal::{Clock, DigitalInput};

/// Per-axis endstop channel. Holds the debounce configuration plus the
/// running debounce state; polled from both the motion executor (abort
/// checks) and the homing coordinator.
pub struct EndstopChannel<I, C> {
    pin: I,
    clock: C,
    inverted: bool,
    debounce_ms: u32,
    last_raw: bool,
    last_change_ms: u64,
    stable: bool,
}

impl<I: DigitalInput, C: Clock> EndstopChannel<I, C> {
    /// Seeds the debounce state from the live pin so the first query never
    /// falsely resets a line that has already been stable for a while.
    pub fn new(pin: I, clock: C, inverted: bool, debounce_ms: u32) -> Self {
        let raw = Self::interpret(&pin, inverted);
        let now = clock.now_ms();
        Self { pin, clock, inverted, debounce_ms, last_raw: raw, last_change_ms: now, stable: raw }
    }

    fn interpret(pin: &I, inverted: bool) -> bool {
        let raw = pin.read_raw();
        if inverted {
            !raw
        } else {
            raw
        }
    }

    /// Uninterpreted except for polarity inversion.
    pub fn raw_state(&self) -> bool {
        Self::interpret(&self.pin, self.inverted)
    }

    /// Debounced triggered/open state. Samples the pin, restarts the
    /// debounce timer on any change, and promotes to the stable value once
    /// the current raw state has held for at least the debounce window.
    pub fn is_triggered(&mut self) -> bool {
        let raw = self.raw_state();
        let now = self.clock.now_ms();
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now;
        } else if now.saturating_sub(self.last_change_ms) >= u64::from(self.debounce_ms) {
            self.stable = raw;
        }
        self.stable
    }
}
