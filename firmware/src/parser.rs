//! Line → `ParsedCommand` (spec §4.6).

use quill_common::command::{HomeSelect, MoveParams, ParsedCommand, SetPositionParams};
use quill_common::types::Axis;

/// Parse one already-assembled input line (no terminator). Strips `;`
/// comments, trims leading/trailing whitespace, and uppercases before
/// tokenizing. Never fails: an unrecognized command word becomes `Unknown`,
/// and a recognized word missing a required parameter becomes
/// `InvalidSyntax`.
pub fn parse_line(raw: &str) -> ParsedCommand {
    let stripped = strip_comment(raw).trim();
    if stripped.is_empty() {
        return ParsedCommand::Unknown;
    }
    let upper = stripped.to_ascii_uppercase();
    let mut tokens = upper.split_ascii_whitespace();
    let Some(head) = tokens.next() else {
        return ParsedCommand::Unknown;
    };
    let rest: heapless::Vec<&str, 8> = tokens.collect();

    match head {
        "G0" | "G1" => ParsedCommand::Move(extract_move_params(&rest)),
        "G28" => ParsedCommand::Home(extract_home_select(&rest)),
        "G90" => ParsedCommand::ModeAbsolute,
        "G91" => ParsedCommand::ModeRelative,
        "G92" => ParsedCommand::SetPosition(extract_set_position(&rest)),
        "M0" => ParsedCommand::Stop,
        "M24" => ParsedCommand::Resume,
        "M25" => ParsedCommand::Pause,
        "M84" => ParsedCommand::DisableSteppers { timeout_s: extract_s(&rest) },
        "M114" => ParsedCommand::QueryPosition,
        "M115" => ParsedCommand::QueryFirmware,
        "M119" => ParsedCommand::QueryEndstops,
        "M220" => match extract_s(&rest) {
            Some(percent) => ParsedCommand::SetSpeedFactor { percent },
            None => ParsedCommand::InvalidSyntax,
        },
        "M410" => ParsedCommand::QuickStop,
        "M503" => ParsedCommand::ReportSettings,
        "M999" => ParsedCommand::DiagnosticMotor { axis: extract_axis(&rest).unwrap_or(Axis::Z) },
        _ => ParsedCommand::Unknown,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// A `Letter<value>` token, e.g. `X10`, `F-5.5`, `S=100`. A leading `=` after
/// the letter is tolerated. Tokens with an unparseable value are silently
/// dropped rather than rejecting the whole line.
fn parse_param(token: &str) -> Option<(char, f32)> {
    let mut chars = token.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    let value: f32 = rest.parse().ok()?;
    Some((letter, value))
}

fn extract_move_params(tokens: &[&str]) -> MoveParams {
    let mut params = MoveParams::default();
    for token in tokens {
        if let Some((letter, value)) = parse_param(token) {
            match letter {
                'X' => params.x = Some(value),
                'Y' => params.y = Some(value),
                'Z' => params.z = Some(value),
                'F' => params.f = Some(value),
                _ => {}
            }
        }
    }
    params
}

fn extract_set_position(tokens: &[&str]) -> SetPositionParams {
    let mut params = SetPositionParams::default();
    for token in tokens {
        if let Some((letter, value)) = parse_param(token) {
            match letter {
                'X' => params.x = Some(value),
                'Y' => params.y = Some(value),
                'Z' => params.z = Some(value),
                _ => {}
            }
        }
    }
    params
}

/// G28 axes are named by letter alone; any numeric value attached is
/// ignored. No axis letters present means "home all".
fn extract_home_select(tokens: &[&str]) -> HomeSelect {
    let mut select = HomeSelect::default();
    for token in tokens {
        match token.chars().next() {
            Some('X') => select.x = true,
            Some('Y') => select.y = true,
            Some('Z') => select.z = true,
            _ => {}
        }
    }
    select.all = !(select.x || select.y || select.z);
    select
}

fn extract_s(tokens: &[&str]) -> Option<f32> {
    tokens.iter().find_map(|t| parse_param(t).filter(|(letter, _)| *letter == 'S').map(|(_, v)| v))
}

fn extract_axis(tokens: &[&str]) -> Option<Axis> {
    tokens.iter().find_map(|t| t.chars().next().and_then(Axis::from_letter))
}
