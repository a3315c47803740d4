//! Wire-facing error taxonomy and internal configuration errors.
//!
//! `ErrorCode` is the numeric code/text pair sent to the host as
//! `error:<code> - <text>`. Internal fallible operations (configuration
//! validation, homing failures) use their own `thiserror`-derived enums and
//! are converted to an `ErrorCode` only at the point where a command handler
//! turns a failure into a protocol response.

use crate::types::Axis;

/// The wire-facing error taxonomy from the protocol error table (codes 1-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    UnknownCommand = 1,
    InvalidSyntax = 2,
    OutOfRange = 3,
    EndstopHit = 4,
    HomingFailed = 5,
    NotHomed = 6,
    BufferOverflow = 7,
    Timeout = 8,
    EmptyCommand = 9,
}

impl ErrorCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The short description sent alongside the code.
    pub const fn text(self) -> &'static str {
        match self {
            ErrorCode::UnknownCommand => "Unknown command",
            ErrorCode::InvalidSyntax => "Invalid syntax",
            ErrorCode::OutOfRange => "Target position out of bounds",
            ErrorCode::EndstopHit => "Endstop triggered unexpectedly",
            ErrorCode::HomingFailed => "Homing failed",
            ErrorCode::NotHomed => "Required axis not homed",
            ErrorCode::BufferOverflow => "Buffer overflow",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::EmptyCommand => "Empty command",
        }
    }

    /// The specific text for an out-of-range move whose jump length (rather
    /// than its target) is the offending quantity. Same code, different
    /// wording, per the literal scenario text in the spec's §8 scenario 4.
    pub const fn jump_text() -> &'static str {
        "Impossible position jump detected"
    }
}

/// Errors raised while validating a [`crate::config::MachineConfig`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("axis {axis:?} has zero step density")]
    ZeroStepDensity { axis: Axis },

    #[error("axis {axis:?} has zero max velocity")]
    ZeroMaxVelocity { axis: Axis },

    #[error("axis {axis:?} has zero max acceleration")]
    ZeroMaxAcceleration { axis: Axis },

    #[error("homing acceleration factor must be in (0, 1), got {0}")]
    InvalidHomingAccelFactor(f32),

    #[error("homing backoff distance must be positive, got {0}")]
    InvalidBackoffDistance(f32),

    #[error("max jump distance must be positive, got {0}")]
    InvalidMaxJump(f32),

    #[error("axis {axis:?} soft limit max must be positive, got {value}")]
    InvalidSoftLimit { axis: Axis, value: f32 },
}

/// Errors raised by the homing coordinator, distinct from the wire-facing
/// `ErrorCode::HomingFailed` (one internal enum collapses to that one code,
/// but carries the reason for logging).
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum HomingError {
    #[error("cannot clear pre-triggered endstop")]
    PreTriggerStuck,
    #[error("stalled before endstop triggered")]
    Stall,
    #[error("endstop still triggered after backoff")]
    BackoffStuck,
    #[error("homing phase timed out")]
    Timeout,
}

/// Errors raised by the serial line assembler.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum SerialError {
    #[error("input line exceeded {0} characters")]
    LineTooLong(usize),
}
