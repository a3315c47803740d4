//! Shared types, configuration, and protocol constants for the pen-plotter
//! motion controller.
//!
//! This crate has no hardware dependencies of its own; every pin-level or
//! transport-level capability it needs is expressed as a trait in [`hal`]
//! and supplied by the firmware binary.

pub mod command;
pub mod config;
pub mod consts;
pub mod endstop;
pub mod error;
pub mod hal;
pub mod queue;
pub mod state;
pub mod types;
pub mod watchdog;

pub mod prelude {
    //! Convenience re-exports for downstream crates.

    // ─── Core types ───────────────────────────────────────────────
    pub use crate::types::{Axis, Point3D};

    // ─── Configuration ────────────────────────────────────────────
    pub use crate::config::{AxisConfig, MachineConfig};

    // ─── Commands & queue ─────────────────────────────────────────
    pub use crate::command::ParsedCommand;
    pub use crate::queue::CommandQueue;

    // ─── Error handling ───────────────────────────────────────────
    pub use crate::error::{ConfigError, ErrorCode};

    // ─── State ────────────────────────────────────────────────────
    pub use crate::state::MachineState;

    // ─── HAL seams ────────────────────────────────────────────────
    pub use crate::hal::{AnalogInput, Clock, DigitalInput, SerialTransport, StepPins};

    // ─── Watchdog ─────────────────────────────────────────────────
    pub use crate::watchdog::Watchdog;
}
