//! mm ⇄ step conversion and soft-limit validation (spec §4.2).

use quill_common::config::MachineConfig;
use quill_common::types::{Axis, Point3D};

/// `round(mm * stepsPerMm[axis])`.
pub fn mm_to_steps(config: &MachineConfig, axis: Axis, mm: f32) -> i32 {
    (mm * config.axis(axis).steps_per_mm).round() as i32
}

/// Inverse of [`mm_to_steps`].
pub fn steps_to_mm(config: &MachineConfig, axis: Axis, steps: i32) -> f32 {
    steps as f32 / config.axis(axis).steps_per_mm
}

/// `0 <= p.x <= XMax && 0 <= p.y <= YMax && 0 <= p.z <= ZMax`.
pub fn is_valid_position(config: &MachineConfig, p: Point3D) -> bool {
    Axis::ALL.iter().all(|&axis| {
        let v = p.get(axis);
        (0.0..=config.axis(axis).soft_limit_max_mm).contains(&v)
    })
}
