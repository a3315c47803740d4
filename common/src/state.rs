//! The single process-wide machine-state aggregate (spec §3, §9 "Global
//! mutable state"). Owned exclusively by the dispatcher and passed by
//! reference to whatever needs to read or mutate it.

use crate::types::{Axis, Point3D};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineState {
    /// Authoritative current position in mm.
    pub position: Point3D,
    /// `true` = absolute (G90), `false` = relative (G91).
    pub absolute_mode: bool,
    /// Current feed rate in mm/min.
    pub feed_rate_mm_min: f32,
    /// Percent, clamped to [1, 999] by command or [10, 200] by the analog
    /// override input.
    pub speed_factor_percent: f32,
    pub homed: [bool; 3],
    pub steppers_disabled: bool,
    pub last_activity_ms: u64,
    /// 0 = never auto-disable.
    pub idle_disable_timeout_ms: u32,
}

impl MachineState {
    /// Initial state at boot: absolute mode, feed rate at `max_xy_velocity *
    /// 60`, full speed factor, nothing homed.
    pub fn boot(max_xy_velocity_mm_s: f32, idle_disable_timeout_ms: u32) -> Self {
        Self {
            position: Point3D::ZERO,
            absolute_mode: true,
            feed_rate_mm_min: max_xy_velocity_mm_s * 60.0,
            speed_factor_percent: 100.0,
            homed: [false; 3],
            steppers_disabled: false,
            last_activity_ms: 0,
            idle_disable_timeout_ms,
        }
    }

    pub fn is_homed(&self, axis: Axis) -> bool {
        self.homed[axis.index()]
    }

    pub fn set_homed(&mut self, axis: Axis, value: bool) {
        self.homed[axis.index()] = value;
    }

    pub fn mark_active(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
        self.steppers_disabled = false;
    }

    /// Whether the idle-disable timer has expired.
    pub fn is_idle_expired(&self, now_ms: u64) -> bool {
        self.idle_disable_timeout_ms != 0
            && now_ms.saturating_sub(self.last_activity_ms) >= u64::from(self.idle_disable_timeout_ms)
    }
}
