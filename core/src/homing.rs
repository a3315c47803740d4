//! Per-axis four-phase homing sequence: pre-clear, fast approach, backoff,
//! slow approach (spec §4.5).

use quill_common::config::MachineConfig;
pub use quill_common::error::HomingError as HomingFailReason;
use quill_common::endstop::EndstopChannel;
use quill_common::hal::{Clock, DigitalInput, StepPins};
use quill_common::types::Axis;
use quill_common::watchdog::Watchdog;

use crate::kinematics::mm_to_steps;
use crate::motion::{MotionExecutor, MotionOutcome};
use crate::stepper::StepperChannel;

/// The step position an axis is seated to on a successful home.
pub type HomingOutcome = Result<i32, HomingFailReason>;

pub struct HomingCoordinator;

impl HomingCoordinator {
    /// Run the full four-phase sequence for one axis. On success, seats the
    /// channel's step counter to the logical zero (or `axisMax`, if homing
    /// toward the max endstop) and returns that step value; the caller is
    /// responsible for updating `MachineState` (homed flag, logical
    /// position in mm) from it.
    pub fn home_axis<P, C, I, W>(
        config: &MachineConfig,
        axis: Axis,
        channels: &mut [StepperChannel<P, C>; 3],
        endstop: &mut EndstopChannel<I, C>,
        clock: &C,
        watchdog: &mut W,
    ) -> HomingOutcome
    where
        P: StepPins,
        C: Clock + Clone,
        I: DigitalInput,
        W: Watchdog,
    {
        let idx = axis.index();
        let axis_cfg = config.axis(axis);
        let steps_per_mm = axis_cfg.steps_per_mm;
        let home_sign = axis_cfg.home_dir as i32;
        let anti_home = -home_sign;

        let fast_speed = config.homing_fast_speed_for(axis) * steps_per_mm;
        let slow_speed = config.homing_slow_speed_for(axis) * steps_per_mm;
        let homing_accel = axis_cfg.max_accel_mm_s2 * steps_per_mm * config.homing_accel_factor;
        let backoff_steps = (config.homing_backoff_mm * steps_per_mm).round() as i32;
        let timeout_ms = u64::from(config.homing_timeout_s) * 1000;

        // Phase 1: pre-clear. If already triggered, back off 2x the
        // backoff distance; fail if it's still triggered afterward.
        if endstop.is_triggered() {
            let target = channels[idx].current_step() + anti_home * backoff_steps * 2;
            move_blocking(channels, idx, target, fast_speed, homing_accel, endstop, clock, watchdog);
            if endstop.is_triggered() {
                return Err(HomingFailReason::PreTriggerStuck);
            }
        }

        // Phase 2: fast approach. Target is 2x the axis max so the endstop
        // is reachable regardless of starting position.
        let far_steps = mm_to_steps(config, axis, axis_cfg.soft_limit_max_mm * 2.0);
        let fast_target = channels[idx].current_step() + home_sign * far_steps;
        match move_until_triggered(
            channels, idx, axis, fast_target, fast_speed, homing_accel, endstop, clock, watchdog, timeout_ms,
        ) {
            MotionOutcome::Completed => return Err(HomingFailReason::Stall),
            MotionOutcome::Aborted(_) if !endstop.is_triggered() => return Err(HomingFailReason::Timeout),
            MotionOutcome::Aborted(_) => {}
        }

        // Phase 3: backoff.
        let backoff_target = channels[idx].current_step() + anti_home * backoff_steps;
        move_blocking(channels, idx, backoff_target, fast_speed, homing_accel, endstop, clock, watchdog);
        if endstop.is_triggered() {
            return Err(HomingFailReason::BackoffStuck);
        }

        // Phase 4: slow approach, travel budget 4x the backoff distance.
        let slow_target = channels[idx].current_step() + home_sign * backoff_steps * 4;
        match move_until_triggered(
            channels, idx, axis, slow_target, slow_speed, homing_accel, endstop, clock, watchdog, timeout_ms,
        ) {
            MotionOutcome::Completed => return Err(HomingFailReason::Stall),
            MotionOutcome::Aborted(_) if !endstop.is_triggered() => return Err(HomingFailReason::Timeout),
            MotionOutcome::Aborted(_) => {}
        }

        let seat_step =
            if axis_cfg.homes_to_max() { mm_to_steps(config, axis, axis_cfg.soft_limit_max_mm) } else { 0 };
        channels[idx].seat_position(seat_step);
        Ok(seat_step)
    }

    /// Home all three axes in the fixed Z, X, Y order (pen lift first for
    /// safety). Every axis is attempted even if an earlier one fails;
    /// results are returned indexed by `Axis::index()`.
    pub fn home_all<P, C, I, W>(
        config: &MachineConfig,
        channels: &mut [StepperChannel<P, C>; 3],
        endstops: &mut [EndstopChannel<I, C>; 3],
        clock: &C,
        watchdog: &mut W,
    ) -> [HomingOutcome; 3]
    where
        P: StepPins,
        C: Clock + Clone,
        I: DigitalInput,
        W: Watchdog,
    {
        let mut results: [HomingOutcome; 3] = [Ok(0), Ok(0), Ok(0)];
        for axis in [Axis::Z, Axis::X, Axis::Y] {
            let idx = axis.index();
            results[idx] = Self::home_axis(config, axis, channels, &mut endstops[idx], clock, watchdog);
        }
        results
    }
}

/// Move a single axis to `target_step` and block until it arrives; the
/// other two channels are held at their current position.
///
/// `endstop` is polled (never acted on) on every tick of the move so its
/// debounce state tracks the pin continuously. Without this, a single
/// snapshot read right after the move could observe the very first raw
/// transition since the last phase's polling and report the pre-move
/// debounced value instead of the settled one.
fn move_blocking<P, C, I, W>(
    channels: &mut [StepperChannel<P, C>; 3],
    idx: usize,
    target_step: i32,
    speed: f32,
    accel: f32,
    endstop: &mut EndstopChannel<I, C>,
    clock: &C,
    watchdog: &mut W,
) -> MotionOutcome
where
    P: StepPins,
    C: Clock,
    I: DigitalInput,
    W: Watchdog,
{
    let targets: [i32; 3] = std::array::from_fn(|i| if i == idx { target_step } else { channels[i].current_step() });
    let mut max_speeds = [0.0; 3];
    let mut accels = [1.0; 3];
    max_speeds[idx] = speed;
    accels[idx] = accel;

    let mut poll = || -> Option<Axis> {
        endstop.is_triggered();
        None
    };
    MotionExecutor::run(channels, targets, max_speeds, accels, clock, watchdog, Some(&mut poll))
}

/// Move a single axis toward `target_step`, aborting the instant the
/// endstop trips or the per-phase timeout elapses. The caller distinguishes
/// the two abort causes by re-checking `endstop.is_triggered()` afterward.
#[allow(clippy::too_many_arguments)]
fn move_until_triggered<P, C, I, W>(
    channels: &mut [StepperChannel<P, C>; 3],
    idx: usize,
    axis: Axis,
    target_step: i32,
    speed: f32,
    accel: f32,
    endstop: &mut EndstopChannel<I, C>,
    clock: &C,
    watchdog: &mut W,
    timeout_ms: u64,
) -> MotionOutcome
where
    P: StepPins,
    C: Clock,
    I: DigitalInput,
    W: Watchdog,
{
    let targets: [i32; 3] = std::array::from_fn(|i| if i == idx { target_step } else { channels[i].current_step() });
    let mut max_speeds = [0.0; 3];
    let mut accels = [1.0; 3];
    max_speeds[idx] = speed;
    accels[idx] = accel;

    let start_ms = clock.now_ms();
    let mut abort = || -> Option<Axis> {
        if endstop.is_triggered() {
            Some(axis)
        } else if clock.now_ms().saturating_sub(start_ms) >= timeout_ms {
            Some(axis)
        } else {
            None
        }
    };
    MotionExecutor::run(channels, targets, max_speeds, accels, clock, watchdog, Some(&mut abort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::hal::sim::{SimClock, SimInput, SimStepPins};
    use quill_common::watchdog::SimWatchdog;

    /// A config with tiny soft limits so the synthetic 2x/4x travel targets
    /// resolve in a handful of steps, and a generous timeout so the
    /// deterministic outcome is never the race between travel completing
    /// and the clock's auto-tick tripping the per-phase timeout.
    fn small_travel_config() -> MachineConfig {
        let mut cfg = MachineConfig::default();
        for axis in Axis::ALL {
            cfg.axis_mut(axis).soft_limit_max_mm = 1.0;
        }
        cfg.homing_backoff_mm = 0.2;
        cfg.homing_timeout_s = 3600;
        cfg
    }

    fn make_channels(clock: &SimClock) -> [StepperChannel<SimStepPins, SimClock>; 3] {
        std::array::from_fn(|_| StepperChannel::new(SimStepPins::default(), clock.clone(), false))
    }

    #[test]
    fn pre_triggered_endstop_that_never_clears_fails_pre_clear() {
        let clock = SimClock::auto_ticking(1);
        let cfg = small_travel_config();
        let mut channels = make_channels(&clock);
        let mut wdt = SimWatchdog::new(clock.clone(), 8_000);

        // Pin starts triggered and is never released, so the pre-clear
        // backoff cannot escape it.
        let pin = SimInput::new(true);
        let mut endstop = EndstopChannel::new(pin, clock.clone(), false, 10);

        let result = HomingCoordinator::home_axis(&cfg, Axis::X, &mut channels, &mut endstop, &clock, &mut wdt);
        assert_eq!(result, Err(HomingFailReason::PreTriggerStuck));
    }

    #[test]
    fn stall_when_endstop_never_trips() {
        let clock = SimClock::auto_ticking(1);
        let cfg = small_travel_config();
        let mut channels = make_channels(&clock);
        let mut wdt = SimWatchdog::new(clock.clone(), 8_000);

        let pin = SimInput::new(false);
        let mut endstop = EndstopChannel::new(pin, clock.clone(), false, 10);

        let result = HomingCoordinator::home_axis(&cfg, Axis::Z, &mut channels, &mut endstop, &clock, &mut wdt);
        assert_eq!(result, Err(HomingFailReason::Stall));
    }

    /// A step/direction pin double that mirrors its signed step position
    /// into a shared counter, paired with a threshold-based endstop double
    /// below — together they model a real limit switch tied to carriage
    /// position, the only way to exercise a full, successful homing pass
    /// (the three tests above only ever exercise failure paths).
    #[derive(Clone, Default)]
    struct TrackedPins {
        position: std::rc::Rc<std::cell::Cell<i32>>,
        forward: std::rc::Rc<std::cell::Cell<bool>>,
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

    #[derive(Clone)]
    struct ThresholdInput {
        position: std::rc::Rc<std::cell::Cell<i32>>,
        trigger_step: i32,
    }

    impl DigitalInput for ThresholdInput {
        fn read_raw(&self) -> bool {
            self.position.get() >= self.trigger_step
        }
    }

    #[test]
    fn homes_successfully_against_a_physically_tied_endstop() {
        let clock = SimClock::auto_ticking(1);
        // Backoff (20 steps) comfortably exceeds the debounce overshoot past
        // the trigger point at this speed (roughly 3 steps at 300 steps/s
        // over a 10ms debounce window), so phase 3 always clears the
        // endstop rather than risking a spurious BackoffStuck.
        let mut cfg = MachineConfig::default();
        cfg.x.steps_per_mm = 10.0;
        cfg.x.max_velocity_mm_s = 50.0;
        cfg.x.max_accel_mm_s2 = 500.0;
        cfg.x.soft_limit_max_mm = 5.0;
        cfg.x.home_dir = 1;
        cfg.homing_backoff_mm = 2.0;
        cfg.homing_timeout_s = 3600;

        let pin = TrackedPins::default();
        let trigger_step = (cfg.x.soft_limit_max_mm * cfg.x.steps_per_mm).round() as i32;
        let endstop_pin = ThresholdInput { position: pin.position.clone(), trigger_step };
        let mut channels: [StepperChannel<TrackedPins, SimClock>; 3] =
            [pin.clone(), pin.clone(), pin].map(|p| StepperChannel::new(p, clock.clone(), false));
        let mut endstop = EndstopChannel::new(endstop_pin, clock.clone(), false, 10);
        let mut wdt = SimWatchdog::new(clock.clone(), 8_000);

        let seat_step = HomingCoordinator::home_axis(&cfg, Axis::X, &mut channels, &mut endstop, &clock, &mut wdt)
            .expect("a physically-tied endstop should let homing converge");
        assert_eq!(seat_step, trigger_step);
    }

    #[test]
    fn home_all_runs_every_axis_even_after_a_failure() {
        let clock = SimClock::auto_ticking(1);
        let cfg = small_travel_config();
        let mut channels = make_channels(&clock);
        let mut endstops: [EndstopChannel<SimInput, SimClock>; 3] =
            std::array::from_fn(|_| EndstopChannel::new(SimInput::new(false), clock.clone(), false, 10));
        let mut wdt = SimWatchdog::new(clock.clone(), 8_000);

        let results = HomingCoordinator::home_all(&cfg, &mut channels, &mut endstops, &clock, &mut wdt);
        // None of the simulated endstops ever trip, so every axis stalls —
        // but all three must have been attempted.
        assert!(results.iter().all(|r| *r == Err(HomingFailReason::Stall)));
    }
}
