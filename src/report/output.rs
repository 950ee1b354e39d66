//! Line sinks for reporter output.

use std::io::{self, Write};

/// Receives report output one line at a time.
pub trait OutputSink {
    fn emit(&mut self, line: &str);
}

/// OutputBuffer: collects output into a String for testing or programmatic capture.
#[derive(Debug, Default, Clone)]
pub struct OutputBuffer {
    pub buffer: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.lines()
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }
}

/// StdoutSink: writes each line to stdout.
///
/// Write errors (a closed pipe) are dropped; the run itself goes on.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn emit(&mut self, line: &str) {
        (**self).emit(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_blank_lines() {
        let mut buffer = OutputBuffer::new();
        buffer.emit("");
        buffer.emit("ok 1 - a");
        assert_eq!(buffer.as_str(), "\nok 1 - a\n");
        assert_eq!(buffer.lines().count(), 2);
    }
}
