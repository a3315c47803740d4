//! Kinematics, stepper channels, the trapezoidal motion executor, and the
//! homing coordinator: the motion pipeline proper.

pub mod homing;
pub mod kinematics;
pub mod motion;
pub mod stepper;

pub mod prelude {
    pub use crate::homing::{HomingCoordinator, HomingFailReason, HomingOutcome};
    pub use crate::kinematics::{is_valid_position, mm_to_steps, steps_to_mm};
    pub use crate::motion::{MotionExecutor, MotionOutcome};
    pub use crate::stepper::StepperChannel;
}
