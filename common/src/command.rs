//! The parsed-command tagged union (spec §3 "ParsedCommand").
//!
//! A sum type whose variants carry disjoint argument bundles, per the design
//! note that a handler should never need to read a field that doesn't belong
//! to the tag it matched on.

/// An optionally-present float parameter, as produced by the parser for
/// `X`/`Y`/`Z`/`F`/`S` tokens.
pub type Param = Option<f32>;

/// G0/G1 parameters: each axis (and feed rate) is independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveParams {
    pub x: Param,
    pub y: Param,
    pub z: Param,
    pub f: Param,
}

impl MoveParams {
    pub fn any_present(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }
}

/// G28 axis selection. `all` is set when the command named no axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HomeSelect {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub all: bool,
}

impl HomeSelect {
    pub fn wants(&self, axis: crate::types::Axis) -> bool {
        use crate::types::Axis;
        self.all
            || match axis {
                Axis::X => self.x,
                Axis::Y => self.y,
                Axis::Z => self.z,
            }
    }
}

/// G92 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SetPositionParams {
    pub x: Param,
    pub y: Param,
    pub z: Param,
}

impl SetPositionParams {
    pub fn any_present(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }
}

/// One fully-parsed input line. Exactly one variant is active at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedCommand {
    /// G0 / G1.
    Move(MoveParams),
    /// G28.
    Home(HomeSelect),
    /// G92.
    SetPosition(SetPositionParams),
    /// G90.
    ModeAbsolute,
    /// G91.
    ModeRelative,
    /// M84. `S` seconds, `None` restores the compile-time default timeout.
    DisableSteppers { timeout_s: Param },
    /// M220.
    SetSpeedFactor { percent: f32 },
    /// M114.
    QueryPosition,
    /// M115.
    QueryFirmware,
    /// M119.
    QueryEndstops,
    /// M503.
    ReportSettings,
    /// M25.
    Pause,
    /// M24.
    Resume,
    /// M0.
    Stop,
    /// M410.
    QuickStop,
    /// M999, defaulting to the Z axis when no letter is given.
    DiagnosticMotor { axis: crate::types::Axis },
    /// A recognized command word with malformed or missing required
    /// parameters (e.g. `M220` with no `S`).
    InvalidSyntax,
    /// Anything syntactically unrecognized or not in the supported set.
    Unknown,
}
