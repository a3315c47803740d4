//! Serial line assembler (spec §4.8): drains a transport byte-by-byte,
//! accumulates lines, and enqueues parsed commands. Runs entirely on the
//! producer side — it never dispatches a command itself.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::warn;

use quill_common::consts::LINE_BUF_LEN;
use quill_common::error::ErrorCode;
use quill_common::hal::SerialTransport;
use quill_common::queue::CommandQueue;

use crate::parser::parse_line;
use crate::responder::{error_line, OK};

/// Errors opening the real hardware transport. Distinct from
/// [`quill_common::error::SerialError`], which covers wire-protocol framing,
/// not the underlying OS handle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open serial port {path}: {source}")]
    Open { path: String, source: serialport::Error },
}

/// Wraps a real `serialport` handle behind [`SerialTransport`]. Opened with
/// a short internal read timeout so [`SerialTransport::read_available`]
/// never blocks the cooperative loop for more than a tick.
pub struct RealTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl RealTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|source| TransportError::Open { path: path.to_string(), source })?;
        Ok(Self { port })
    }
}

impl SerialTransport for RealTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        match self.port.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => {
                warn!(error = %e, "serial read error");
                0
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) {
        if let Err(e) = self.port.write_all(data) {
            warn!(error = %e, "serial write error");
        }
    }
}

/// Real hardware runs at 8N1, 115200 baud; the line/overflow bookkeeping
/// below is transport-agnostic.
pub struct SerialLineAssembler {
    buf: heapless::Vec<u8, LINE_BUF_LEN>,
    /// Set once an overflowing line has had its error sent; stays set until
    /// the next terminator so the rest of the oversized line is discarded
    /// silently rather than re-erroring byte by byte.
    discarding: bool,
}

impl SerialLineAssembler {
    pub fn new() -> Self {
        Self { buf: heapless::Vec::new(), discarding: false }
    }

    /// Drain everything currently available from `transport`, feed the
    /// queue, and write any producer-side responses (error 1 on an unknown
    /// command, error 2 on a known command with malformed parameters, error
    /// 7 on overflow) directly back to `transport`.
    pub fn poll<T: SerialTransport>(&mut self, transport: &mut T, queue: &mut CommandQueue) {
        let mut chunk = [0u8; 64];
        loop {
            let n = transport.read_available(&mut chunk);
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                self.feed_byte(byte, transport, queue);
            }
        }
    }

    fn feed_byte<T: SerialTransport>(&mut self, byte: u8, transport: &mut T, queue: &mut CommandQueue) {
        if byte == b'\r' || byte == b'\n' {
            self.finish_line(transport, queue);
            return;
        }
        if self.discarding {
            return;
        }
        if self.buf.push(byte).is_err() {
            self.discarding = true;
            self.buf.clear();
            write_line(transport, &error_line(ErrorCode::BufferOverflow));
            write_line(transport, OK);
        }
    }

    fn finish_line<T: SerialTransport>(&mut self, transport: &mut T, queue: &mut CommandQueue) {
        if self.discarding {
            self.discarding = false;
            self.buf.clear();
            return;
        }
        if self.buf.is_empty() {
            return;
        }
        let line = core::str::from_utf8(&self.buf).unwrap_or("");
        let cmd = parse_line(line);
        self.buf.clear();

        if matches!(cmd, quill_common::command::ParsedCommand::Unknown) {
            write_line(transport, &error_line(ErrorCode::UnknownCommand));
            write_line(transport, OK);
            return;
        }
        if matches!(cmd, quill_common::command::ParsedCommand::InvalidSyntax) {
            write_line(transport, &error_line(ErrorCode::InvalidSyntax));
            write_line(transport, OK);
            return;
        }
        if !queue.push(cmd) {
            write_line(transport, &error_line(ErrorCode::BufferOverflow));
            write_line(transport, OK);
        }
        // A successfully queued command gets its terminator from the
        // dispatcher once it actually executes, never from here.
    }
}

impl Default for SerialLineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_line<T: SerialTransport>(transport: &mut T, line: &str) {
    transport.write_all(line.as_bytes());
    transport.write_all(b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::hal::sim::SimTransport;

    #[test]
    fn accepted_line_is_queued_without_a_terminator() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        transport.feed("G90\n");
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 1);
        assert_eq!(transport.take_output(), "");
    }

    #[test]
    fn unknown_command_gets_error_and_terminator_immediately() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        transport.feed("G5000\n");
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 0);
        assert_eq!(transport.take_output(), "error:1 - Unknown command\nok\n");
    }

    #[test]
    fn known_command_missing_required_param_gets_invalid_syntax_not_unknown() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        transport.feed("M220\n");
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 0);
        assert_eq!(transport.take_output(), "error:2 - Invalid syntax\nok\n");
    }

    #[test]
    fn empty_line_is_silently_ignored() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        transport.feed("\n\n");
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 0);
        assert_eq!(transport.take_output(), "");
    }

    #[test]
    fn a_64_char_line_is_accepted() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        let line = format!("{}\n", "G90".to_string() + &" ".repeat(61));
        assert_eq!(line.len() - 1, 64);
        transport.feed(&line);
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 1);
        assert_eq!(transport.take_output(), "");
    }

    #[test]
    fn a_65_char_line_overflows() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        let line = format!("{}\n", "G90".to_string() + &" ".repeat(62));
        assert_eq!(line.len() - 1, 65);
        transport.feed(&line);
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 0);
        assert_eq!(transport.take_output(), "error:7 - Buffer overflow\nok\n");
    }

    #[test]
    fn overflowing_line_errors_once_and_discards_the_remainder() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        let long_line = "G0 ".to_string() + &"X".repeat(100) + "\n";
        transport.feed(&long_line);
        assembler.poll(&mut transport, &mut queue);

        assert_eq!(queue.len(), 0);
        assert_eq!(transport.take_output(), "error:7 - Buffer overflow\nok\n");
    }

    #[test]
    fn queue_full_reports_overflow_on_the_ninth_push() {
        let mut transport = SimTransport::new();
        let mut queue = CommandQueue::new();
        let mut assembler = SerialLineAssembler::new();

        for _ in 0..8 {
            transport.feed("G90\n");
        }
        assembler.poll(&mut transport, &mut queue);
        assert_eq!(queue.len(), 8);
        assert_eq!(transport.take_output(), "");

        transport.feed("G90\n");
        assembler.poll(&mut transport, &mut queue);
        assert_eq!(transport.take_output(), "error:7 - Buffer overflow\nok\n");
    }
}
