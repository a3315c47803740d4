//! Per-axis step/direction stepper channel (spec §4.3).

use quill_common::hal::{Clock, StepPins};

/// Which sign of step-rate drives pulse emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Pulses driven purely by `current_speed`, no target.
    ConstantSpeed,
    /// Pulses driven toward `target_step`, direction inferred from sign of
    /// `target_step - current_step`.
    ToPosition,
}

/// One axis' step/direction/enable pins plus its motion bookkeeping.
pub struct StepperChannel<P, C> {
    pins: P,
    clock: C,
    current_step: i32,
    target_step: i32,
    /// Steps/s, always non-negative; direction comes from `pins`.
    current_speed: f32,
    max_speed: f32,
    accel: f32,
    direction_inverted: bool,
    mode: Mode,
    last_pulse_ms: f64,
}

impl<P: StepPins, C: Clock> StepperChannel<P, C> {
    pub fn new(pins: P, clock: C, direction_inverted: bool) -> Self {
        Self {
            pins,
            clock,
            current_step: 0,
            target_step: 0,
            current_speed: 0.0,
            max_speed: 0.0,
            accel: 0.0,
            direction_inverted,
            mode: Mode::ConstantSpeed,
            last_pulse_ms: 0.0,
        }
    }

    pub fn current_step(&self) -> i32 {
        self.current_step
    }

    pub fn target_step(&self) -> i32 {
        self.target_step
    }

    pub fn remaining_steps(&self) -> i32 {
        self.target_step - self.current_step
    }

    pub fn is_at_target(&self) -> bool {
        self.current_step == self.target_step
    }

    /// Silently refuses zero: a zero max speed would produce undefined step
    /// intervals (spec §4.3).
    pub fn set_max_speed(&mut self, speed: f32) {
        if speed > 0.0 {
            self.max_speed = speed;
        }
    }

    pub fn set_accel(&mut self, accel: f32) {
        self.accel = accel;
    }

    pub fn set_current_speed(&mut self, speed: f32) {
        self.current_speed = speed.max(0.0);
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn accel(&self) -> f32 {
        self.accel
    }

    /// Seat a new target and switch to `ToPosition` mode.
    pub fn move_to(&mut self, target_step: i32) {
        self.target_step = target_step;
        self.mode = Mode::ToPosition;
    }

    /// Drive indefinitely at `current_speed` without a target.
    pub fn run_constant_speed(&mut self) {
        self.mode = Mode::ConstantSpeed;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.pins.set_enabled(enabled);
    }

    /// Re-seat current position to itself: zeroes remaining distance and
    /// speed. The channel's atomic instant-stop primitive (spec §4.3, §5).
    pub fn instant_stop(&mut self) {
        self.target_step = self.current_step;
        self.current_speed = 0.0;
    }

    /// Force both current and target step counters to an arbitrary value
    /// with no motion (used to seat the logical zero after homing, and by
    /// G92 to resync step counters to a redefined position).
    pub fn seat_position(&mut self, step: i32) {
        self.current_step = step;
        self.target_step = step;
        self.current_speed = 0.0;
    }

    /// Emit `count` raw pulses, bypassing the speed profile and direction
    /// bookkeeping entirely. Used by the diagnostic motor command to check
    /// hardware path integrity; does not update `current_step`.
    pub fn diagnostic_pulses(&mut self, count: u32) {
        for _ in 0..count {
            self.pins.pulse();
        }
    }

    /// Emit at most one pulse, if enough time has elapsed at the current
    /// speed. Returns `true` if a pulse was emitted.
    pub fn step(&mut self) -> bool {
        if self.current_speed <= 0.0 {
            return false;
        }
        if self.mode == Mode::ToPosition && self.is_at_target() {
            return false;
        }

        let forward = match self.mode {
            Mode::ToPosition => self.target_step > self.current_step,
            Mode::ConstantSpeed => self.current_step >= 0,
        };

        let now = self.clock.now_ms() as f64;
        let interval_ms = 1000.0 / self.current_speed as f64;
        if now - self.last_pulse_ms < interval_ms {
            return false;
        }

        self.pins.set_direction(forward != self.direction_inverted);
        self.pins.pulse();
        self.current_step += if forward { 1 } else { -1 };
        self.last_pulse_ms = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::hal::sim::{SimClock, SimStepPins};

    fn make() -> (StepperChannel<SimStepPins, SimClock>, SimClock) {
        let clock = SimClock::new();
        (StepperChannel::new(SimStepPins::default(), clock.clone(), false), clock)
    }

    #[test]
    fn zero_max_speed_is_refused() {
        let (mut ch, _clock) = make();
        ch.set_max_speed(100.0);
        ch.set_max_speed(0.0);
        assert_eq!(ch.max_speed(), 100.0);
    }

    #[test]
    fn to_position_stops_cleanly_on_reaching_target() {
        let (mut ch, clock) = make();
        ch.set_current_speed(1000.0); // 1 pulse/ms
        ch.move_to(3);
        let mut pulses = 0;
        for _ in 0..10 {
            clock.advance(1);
            if ch.step() {
                pulses += 1;
            }
        }
        assert_eq!(ch.current_step(), 3);
        assert_eq!(pulses, 3);
        assert!(ch.is_at_target());
    }

    #[test]
    fn instant_stop_zeroes_remaining_distance_and_speed() {
        let (mut ch, _clock) = make();
        ch.set_current_speed(500.0);
        ch.move_to(1000);
        ch.instant_stop();
        assert_eq!(ch.remaining_steps(), 0);
        assert_eq!(ch.current_speed(), 0.0);
    }

    #[test]
    fn no_pulse_without_elapsed_interval() {
        let (mut ch, clock) = make();
        ch.set_current_speed(10.0); // 100ms/pulse
        ch.move_to(100);
        clock.advance(50);
        assert!(!ch.step());
    }

    #[test]
    fn diagnostic_pulses_do_not_move_the_step_counter() {
        let (mut ch, _clock) = make();
        ch.diagnostic_pulses(10);
        assert_eq!(ch.current_step(), 0);
    }

    #[test]
    fn seat_position_sets_both_counters_with_no_motion() {
        let (mut ch, _clock) = make();
        ch.set_current_speed(500.0);
        ch.move_to(1000);
        ch.seat_position(2400);
        assert_eq!(ch.current_step(), 2400);
        assert_eq!(ch.target_step(), 2400);
        assert!(ch.is_at_target());
    }
}
