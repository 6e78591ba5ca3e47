//! Line-oriented diagnostic log threaded through the peak search.
//!
//! The search reports every phase and every accepted or discarded candidate
//! to a caller-supplied [`PeakLog`]. Nothing parses these lines; they exist
//! for people reading a run afterwards.

use common::OutputStream;

/// Append-only sink for human-readable log lines.
pub trait PeakLog {
    /// Append one line. `line` carries no trailing newline.
    fn append(&mut self, line: &str);
}

impl PeakLog for String {
    fn append(&mut self, line: &str) {
        self.push_str(line);
        self.push('\n');
    }
}

impl PeakLog for Vec<String> {
    fn append(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl PeakLog for OutputStream {
    fn append(&mut self, line: &str) {
        self.write(line);
    }
}

/// Forwards every line to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl PeakLog for TracingLog {
    fn append(&mut self, line: &str) {
        tracing::trace!(target: "braggpeaks::log", "{}", line);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl PeakLog for NullLog {
    fn append(&mut self, _line: &str) {}
}
