//! Compile-time machine configuration.
//!
//! Everything here is fixed at build time (spec §6: "Persisted state: none in
//! the core. All configuration is compile-time."). `serde` derives exist so a
//! configuration can be snapshotted into a test fixture or a debug log line,
//! never so it can be loaded from a file on the device.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Axis;

/// The Z axis step density has a documented "800 vs 400 steps/mm" ambiguity
/// (leadscrew + microstepping uncertainty, spec §9). Resolved to 800 here;
/// see `DESIGN.md` for the reasoning. Board revisions that need 400 should
/// override `MachineConfig::z` rather than change this constant.
pub const DEFAULT_Z_STEPS_PER_MM: f32 = 800.0;

/// Per-axis compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub steps_per_mm: f32,
    pub max_velocity_mm_s: f32,
    pub max_accel_mm_s2: f32,
    pub soft_limit_max_mm: f32,
    /// `+1` or `-1`; direction of travel that drives this axis into its home
    /// endstop.
    pub home_dir: i8,
    pub invert_direction: bool,
    pub invert_endstop: bool,
}

impl AxisConfig {
    fn validate(&self, axis: Axis) -> Result<(), ConfigError> {
        if self.steps_per_mm <= 0.0 {
            return Err(ConfigError::ZeroStepDensity { axis });
        }
        if self.max_velocity_mm_s <= 0.0 {
            return Err(ConfigError::ZeroMaxVelocity { axis });
        }
        if self.max_accel_mm_s2 <= 0.0 {
            return Err(ConfigError::ZeroMaxAcceleration { axis });
        }
        if self.soft_limit_max_mm <= 0.0 {
            return Err(ConfigError::InvalidSoftLimit { axis, value: self.soft_limit_max_mm });
        }
        Ok(())
    }

    /// `+1` if homing toward the max endstop, `-1` toward the min.
    pub fn homes_to_max(&self) -> bool {
        self.home_dir > 0
    }
}

/// Full machine configuration: per-axis constants plus the handful of
/// cross-axis and homing-global tunables from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub z: AxisConfig,

    /// Z height considered "pen up" — not enforced by the core, just a
    /// reference constant for the dispatcher/UI layer.
    pub pen_up_z_mm: f32,
    /// Z parking position driven to after a successful Z (or home-all) home.
    pub post_home_z_mm: f32,

    pub homing_fast_speed_mm_s: f32,
    pub homing_slow_speed_mm_s: f32,
    pub homing_backoff_mm: f32,
    /// Multiplier (< 1) applied to an axis' configured acceleration while
    /// homing, so approach/backoff moves ramp more gently.
    pub homing_accel_factor: f32,
    pub homing_timeout_s: u32,

    /// Largest Euclidean jump (mm) a single Move command may request.
    pub max_jump_mm: f32,

    pub endstop_debounce_ms: u32,
    /// 0 = never auto-disable steppers on inactivity.
    pub idle_disable_timeout_ms: u32,
}

impl MachineConfig {
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisConfig {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// Homing speeds capped by the axis' own max velocity (spec §4.5
    /// "Feedrate caps per axis").
    pub fn homing_fast_speed_for(&self, axis: Axis) -> f32 {
        self.homing_fast_speed_mm_s.min(self.axis(axis).max_velocity_mm_s)
    }

    pub fn homing_slow_speed_for(&self, axis: Axis) -> f32 {
        self.homing_slow_speed_mm_s.min(self.axis(axis).max_velocity_mm_s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.x.validate(Axis::X)?;
        self.y.validate(Axis::Y)?;
        self.z.validate(Axis::Z)?;

        if self.homing_accel_factor <= 0.0 || self.homing_accel_factor >= 1.0 {
            return Err(ConfigError::InvalidHomingAccelFactor(self.homing_accel_factor));
        }
        if self.homing_backoff_mm <= 0.0 {
            return Err(ConfigError::InvalidBackoffDistance(self.homing_backoff_mm));
        }
        if self.max_jump_mm <= 0.0 {
            return Err(ConfigError::InvalidMaxJump(self.max_jump_mm));
        }
        Ok(())
    }
}

impl Default for MachineConfig {
    /// The reference pen plotter's literal constants.
    fn default() -> Self {
        Self {
            x: AxisConfig {
                steps_per_mm: 80.0,
                max_velocity_mm_s: 150.0,
                max_accel_mm_s2: 1000.0,
                soft_limit_max_mm: 300.0,
                home_dir: 1,
                invert_direction: false,
                invert_endstop: false,
            },
            y: AxisConfig {
                steps_per_mm: 80.0,
                max_velocity_mm_s: 150.0,
                max_accel_mm_s2: 1000.0,
                soft_limit_max_mm: 200.0,
                home_dir: -1,
                invert_direction: true,
                invert_endstop: false,
            },
            z: AxisConfig {
                steps_per_mm: DEFAULT_Z_STEPS_PER_MM,
                max_velocity_mm_s: 20.0,
                max_accel_mm_s2: 100.0,
                soft_limit_max_mm: 30.0,
                home_dir: -1,
                invert_direction: false,
                invert_endstop: false,
            },
            pen_up_z_mm: 5.0,
            post_home_z_mm: 2.0,
            homing_fast_speed_mm_s: 30.0,
            homing_slow_speed_mm_s: 5.0,
            homing_backoff_mm: 5.0,
            homing_accel_factor: 0.5,
            homing_timeout_s: 60,
            max_jump_mm: 1000.0,
            endstop_debounce_ms: 10,
            idle_disable_timeout_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MachineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_step_density_rejected() {
        let mut cfg = MachineConfig::default();
        cfg.x.steps_per_mm = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroStepDensity { axis: Axis::X }));
    }

    #[test]
    fn homing_accel_factor_must_be_less_than_one() {
        let mut cfg = MachineConfig::default();
        cfg.homing_accel_factor = 1.2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn homing_speed_capped_by_axis_max_velocity() {
        let mut cfg = MachineConfig::default();
        cfg.z.max_velocity_mm_s = 2.0;
        assert_eq!(cfg.homing_fast_speed_for(Axis::Z), 2.0);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = MachineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MachineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
