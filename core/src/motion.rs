//! Trapezoidal motion executor: drives three stepper channels to their
//! targets under one shared speed profile synchronized to the dominant axis
//! (spec §4.4).

use quill_common::consts::{MIN_SPEED_FRACTION, MIN_SPEED_STEPS_PER_S, MOTION_TICK_MS};
use quill_common::hal::{Clock, StepPins};
use quill_common::types::Axis;
use quill_common::watchdog::Watchdog;

use crate::stepper::StepperChannel;

/// Result of running a composite move to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Every channel reached its target.
    Completed,
    /// The abort predicate fired; the named axis is the one it reported.
    Aborted(Axis),
}

/// Floor applied to a channel's seated speed: the larger of the fractional
/// floor and the absolute floor, never above the channel's own max speed.
fn speed_floor(axis_max_speed: f32, dominant_max_speed: f32) -> f32 {
    let frac_floor = dominant_max_speed * MIN_SPEED_FRACTION;
    frac_floor.max(MIN_SPEED_STEPS_PER_S).min(axis_max_speed.max(1.0))
}

/// Instantaneous speed along the dominant axis at a given progress, per the
/// three-phase trapezoid (or triangle, if `accel_steps` was collapsed).
fn profile_speed(progress: f32, total: f32, accel_steps: f32, vmax: f32, accel: f32, floor: f32) -> f32 {
    let remaining = total - progress;
    let v = if progress < accel_steps {
        (2.0 * accel * progress).sqrt()
    } else if remaining < accel_steps {
        (2.0 * accel * remaining.max(0.0)).sqrt()
    } else {
        vmax
    };
    v.clamp(floor, vmax)
}

pub struct MotionExecutor;

impl MotionExecutor {
    /// Run all three channels to `targets` (absolute step counts) under one
    /// shared trapezoidal profile. `max_speeds`/`accels` are per-axis
    /// steps/s and steps/s². Channels whose target equals their current
    /// position are left alone (never seated with a driving speed).
    ///
    /// `abort`, if given, is polled at the same cadence as the speed
    /// recompute; if it returns `Some(axis)` every channel is instantly
    /// stopped and [`MotionOutcome::Aborted`] is returned.
    pub fn run<P, C, W>(
        channels: &mut [StepperChannel<P, C>; 3],
        targets: [i32; 3],
        max_speeds: [f32; 3],
        accels: [f32; 3],
        clock: &C,
        watchdog: &mut W,
        mut abort: Option<&mut dyn FnMut() -> Option<Axis>>,
    ) -> MotionOutcome
    where
        P: StepPins,
        C: Clock,
        W: Watchdog,
    {
        let starts: [i32; 3] = std::array::from_fn(|i| channels[i].current_step());
        let deltas: [i32; 3] = std::array::from_fn(|i| targets[i] - starts[i]);
        let moving: [bool; 3] = std::array::from_fn(|i| deltas[i] != 0);

        let dominant = (0..3).max_by_key(|&i| deltas[i].unsigned_abs()).unwrap_or(0);
        let total_dom = deltas[dominant].unsigned_abs() as f32;

        for i in 0..3 {
            channels[i].move_to(targets[i]);
            channels[i].set_accel(accels[i]);
            if moving[i] {
                channels[i].set_max_speed(max_speeds[i]);
            }
        }

        if total_dom == 0.0 {
            return MotionOutcome::Completed;
        }

        let vmax_dom = max_speeds[dominant].max(1.0);
        let accel_dom = accels[dominant].max(1.0);
        let mut accel_steps = (vmax_dom * vmax_dom) / (2.0 * accel_dom);
        if 2.0 * accel_steps > total_dom {
            accel_steps = total_dom / 2.0;
        }

        // Seat an initial nonzero speed on every moving axis before the
        // first tick, so the very first pulse loop is not starved.
        for i in 0..3 {
            if moving[i] {
                let floor = speed_floor(max_speeds[i], vmax_dom);
                channels[i].set_current_speed(floor);
            }
        }

        let dom_floor = speed_floor(vmax_dom, vmax_dom);
        let mut last_tick_ms = clock.now_ms();
        loop {
            watchdog.feed();

            if let Some(cb) = abort.as_deref_mut() {
                if let Some(axis) = cb() {
                    for ch in channels.iter_mut() {
                        ch.instant_stop();
                    }
                    return MotionOutcome::Aborted(axis);
                }
            }

            let now = clock.now_ms();
            if now.saturating_sub(last_tick_ms) >= u64::from(MOTION_TICK_MS) {
                last_tick_ms = now;
                let progress = (total_dom - channels[dominant].remaining_steps().unsigned_abs() as f32).max(0.0);
                let v_dom = profile_speed(progress, total_dom, accel_steps, vmax_dom, accel_dom, dom_floor);
                for i in 0..3 {
                    if moving[i] {
                        let ratio = max_speeds[i] / vmax_dom;
                        let floor = speed_floor(max_speeds[i], vmax_dom);
                        let seated = (v_dom * ratio).clamp(floor, max_speeds[i].max(floor));
                        channels[i].set_current_speed(seated);
                    }
                }
            }

            let mut any_remaining = false;
            for ch in channels.iter_mut() {
                ch.step();
                if !ch.is_at_target() {
                    any_remaining = true;
                }
            }
            if !any_remaining {
                break;
            }
        }

        MotionOutcome::Completed
    }
}
