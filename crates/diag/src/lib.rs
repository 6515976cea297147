use std::cell::RefCell;
use std::fmt;

/// Where in the original (pre-preprocessing) source a piece of data came
/// from. Ordered by file name, then line number, so collections of
/// positions sort the way the final report expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilePosition {
    file_name: String,
    line_no: u32,
}

impl FilePosition {
    pub fn new(file_name: impl Into<String>, line_no: u32) -> Self {
        Self {
            file_name: file_name.into(),
            line_no,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn incr_line(&mut self) {
        self.line_no += 1;
    }
}

impl fmt::Display for FilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} of file {}", self.line_no, self.file_name)
    }
}

/// Receiver for recoverable warnings. Every pipeline stage emits through
/// one shared sink; warnings never abort processing.
pub trait DiagSink {
    fn warn(&self, message: &str);
}

/// Production sink: one warning per stdout line.
pub struct StdoutSink;

impl DiagSink for StdoutSink {
    fn warn(&self, message: &str) {
        println!("{}", message);
    }
}

/// Records warnings instead of printing them. Used by tests to assert on
/// exactly which diagnostics a piece of input produced.
#[derive(Default)]
pub struct MemorySink {
    messages: RefCell<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }
}

impl DiagSink for MemorySink {
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// Formats a warning anchored to a named lexeme at a source position.
pub fn warn_lexeme(sink: &dyn DiagSink, lead: &str, lexeme: &str, at: &FilePosition, trail: &str) {
    sink.warn(&format!("WARNING: {}{} found {}{}", lead, lexeme, at, trail));
}

/// Formats a warning about a source position without a lexeme.
pub fn warn_at(sink: &dyn DiagSink, lead: &str, at: &FilePosition, trail: &str) {
    sink.warn(&format!("WARNING: {}{}{}", lead, at, trail));
}
