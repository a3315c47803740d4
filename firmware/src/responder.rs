//! Protocol response formatting (spec §6). Pure string builders — no I/O;
//! the dispatcher decides when and where each line gets written.

use quill_common::error::ErrorCode;
use quill_common::types::{Axis, Point3D};

/// Static identification sent in the M115 banner and on reset.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub board: &'static str,
}

impl FirmwareInfo {
    pub const fn new(name: &'static str, version: &'static str, board: &'static str) -> Self {
        Self { name, version, board }
    }
}

pub const OK: &str = "ok";

pub fn error_line(code: ErrorCode) -> String {
    format!("error:{} - {}", code.code(), code.text())
}

/// Same code, different wording — the "impossible jump" scenario text.
pub fn jump_error_line() -> String {
    format!("error:{} - {}", ErrorCode::OutOfRange.code(), ErrorCode::jump_text())
}

pub fn info_line(text: &str) -> String {
    format!("// {text}")
}

/// M114.
pub fn position_line(p: Point3D) -> String {
    format!("X:{:.2} Y:{:.2} Z:{:.2}", p.x, p.y, p.z)
}

/// M115.
pub fn firmware_line(info: &FirmwareInfo) -> String {
    format!(
        "FIRMWARE_NAME:{} FIRMWARE_VERSION:{} PROTOCOL_VERSION:1.0 MACHINE_TYPE:PenPlotter BOARD_TYPE:{} EXTRUDER_COUNT:0",
        info.name, info.version, info.board
    )
}

/// One of the three M119 lines.
pub fn endstop_line(axis: Axis, triggered: bool) -> String {
    let letter = axis.letter().to_ascii_lowercase();
    format!("{letter}_min: {}", if triggered { "TRIGGERED" } else { "open" })
}
