//! Hardware watchdog feed trait.
//!
//! Repurposed from the teacher's process-supervision `Watchdog` (which
//! restarts dead sibling processes) to the much narrower hardware-WDT
//! contract this firmware actually needs: periodically `feed()` the timer
//! or the MCU resets. There is exactly one watchdog, it supervises nothing
//! but itself, and a miss is fatal rather than recoverable.

use tracing::error;

/// Something that must be fed at least once every [`crate::consts::WATCHDOG_WINDOW_MS`]
/// or the device resets.
pub trait Watchdog {
    fn feed(&mut self);
}

/// A software stand-in for the real hardware timer, used in tests and in
/// any host-side simulation of the dispatcher. Tracks the longest gap
/// between feeds and logs (rather than resets) on a miss, since there is no
/// real MCU to reset in a test build.
pub struct SimWatchdog<C> {
    clock: C,
    window_ms: u32,
    last_feed_ms: u64,
    missed: bool,
}

impl<C: crate::hal::Clock> SimWatchdog<C> {
    pub fn new(clock: C, window_ms: u32) -> Self {
        let now = clock.now_ms();
        Self { clock, window_ms, last_feed_ms: now, missed: false }
    }

    /// Whether a feed was ever more than `window_ms` late.
    pub fn missed_deadline(&self) -> bool {
        self.missed
    }
}

impl<C: crate::hal::Clock> Watchdog for SimWatchdog<C> {
    fn feed(&mut self) {
        let now = self.clock.now_ms();
        let elapsed = now.saturating_sub(self.last_feed_ms);
        if elapsed > u64::from(self.window_ms) {
            self.missed = true;
            error!(elapsed_ms = elapsed, window_ms = self.window_ms, "watchdog deadline missed");
        }
        self.last_feed_ms = now;
    }
}
