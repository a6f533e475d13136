//! Report sinks for health check and surgery output.
//!
//! Reports are ordered lines of text. The same sequences are written to the
//! console in production and captured verbatim by tests, so the line format
//! is part of the crate's contract.

/// Accepts ordered report lines at three severities.
///
/// The severities only select the output stream; they carry no other
/// behavior.
pub trait ReportSink {
    fn info(&mut self, msg: &str);
    fn warning(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Writes info and warning lines to stdout, error lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReport;

impl ReportSink for ConsoleReport {
    fn info(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn warning(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{msg}");
    }
}

/// Captures all report lines in memory, in emission order.
#[derive(Debug, Default, Clone)]
pub struct MemoryReport {
    lines: Vec<String>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines in emission order, severities interleaved.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl ReportSink for MemoryReport {
    fn info(&mut self, msg: &str) {
        self.lines.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.lines.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.lines.push(msg.to_string());
    }
}
