//! Narrow external-collaborator seam for the SD-card job reader (spec §1:
//! "treated as an alternate producer that feeds the same command queue").
//! The real reader lives outside the core; the dispatcher only needs to
//! know whether it is currently feeding the queue and to be able to pause
//! or stop it on command.

pub trait FileReader {
    /// Whether a job is currently open and not paused.
    fn is_active(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);
    /// The next non-empty, non-comment line, or `None` on EOF (which also
    /// closes the job — a subsequent `is_active` call returns `false`).
    fn next_line(&mut self) -> Option<String>;
}

/// No SD card attached; used by builds (and tests) with no file-reader job
/// source.
#[derive(Debug, Default)]
pub struct NoFileReader;

impl FileReader for NoFileReader {
    fn is_active(&self) -> bool {
        false
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn set_paused(&mut self, _paused: bool) {}

    fn next_line(&mut self) -> Option<String> {
        None
    }
}
