//! Test doubles shared between this crate's own `#[cfg(test)]` modules and
//! its `tests/` integration suite. Kept as a real (non-`cfg(test)`) module
//! since an external integration-test binary links the crate as built, the
//! same way `quill_common::hal::sim` ships in the production binary rather
//! than only in test builds.

use std::cell::Cell;
use std::rc::Rc;

use quill_common::hal::{DigitalInput, StepPins};

/// A step/direction pin double that mirrors its signed step position into a
/// shared counter, so a [`ThresholdInput`] can model a physical limit switch
/// tied to real carriage position rather than a manually flipped flag.
#[derive(Clone, Default)]
pub struct TrackedPins {
    pub position: Rc<Cell<i32>>,
    forward: Rc<Cell<bool>>,
}

impl StepPins for TrackedPins {
    fn pulse(&mut self) {
        let delta = if self.forward.get() { 1 } else { -1 };
        self.position.set(self.position.get() + delta);
    }

    fn set_direction(&mut self, forward: bool) {
        self.forward.set(forward);
    }

    fn set_enabled(&mut self, _enabled: bool) {}
}

/// A limit switch that trips once the shared position counter crosses
/// `trigger_step` in the homing direction, and releases again once it backs
/// off past it — the same physical behavior a real lever switch has, unlike
/// a manually-set flag.
#[derive(Clone)]
pub struct ThresholdInput {
    pub position: Rc<Cell<i32>>,
    pub trigger_step: i32,
    pub homes_positive: bool,
}

impl DigitalInput for ThresholdInput {
    fn read_raw(&self) -> bool {
        if self.homes_positive {
            self.position.get() >= self.trigger_step
        } else {
            self.position.get() <= self.trigger_step
        }
    }
}
