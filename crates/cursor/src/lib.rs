use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use diag::{DiagSink, FilePosition};

/// Returns the first position at or after `start` that is not a space or
/// tab, or `None` if only whitespace remains.
pub fn burn_spaces(buf: &str, start: usize) -> Option<usize> {
    let bytes = buf.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] != b' ' && bytes[pos] != b'\t' {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// Returns the position of the quote that closes the current string
/// literal: the next `"` not directly preceded by a backslash.
pub fn next_close_quote(buf: &str, start: usize) -> Option<usize> {
    let bytes = buf.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b'"' && (pos == 0 || bytes[pos - 1] != b'\\') {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

/// If the line ends with an escaped newline, returns the position of the
/// escape char. A common mistake is trailing spaces after the backslash,
/// so those are burned first. Inside a string literal a backslash may be a
/// literal escaped backslash: an odd-length run of trailing backslashes
/// escapes the newline, an even-length run does not.
pub fn esc_newline_pos(buf: &str, multi_line_quote: bool) -> Option<usize> {
    let bytes = buf.as_bytes();
    let mut index = bytes.len();
    while index > 0 {
        let c = bytes[index - 1];
        if c != b' ' && c != b'\t' {
            break;
        }
        index -= 1;
    }
    if index == 0 {
        return None; // all spaces
    }
    let index = index - 1;
    if bytes[index] != b'\\' {
        return None;
    }
    if !multi_line_quote {
        return Some(index);
    }
    let mut run = 0usize;
    let mut pos = index;
    loop {
        if bytes[pos] != b'\\' {
            break;
        }
        run += 1;
        if pos == 0 {
            break;
        }
        pos -= 1;
    }
    if run % 2 == 1 {
        Some(index)
    } else {
        None
    }
}

fn find_from(buf: &str, needle: &str, start: usize) -> Option<usize> {
    if start >= buf.len() {
        return None;
    }
    buf[start..].find(needle).map(|i| i + start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextState {
    Comment,
    Quote,
    Preproc,
    Other,
}

/// Lowest level of text processing: reads lines from a preprocessed file,
/// eliminates comments, and interprets preprocessor line directives. Most
/// of the pipeline cares where something appears in the original source,
/// which is not the same as its position in the preprocessor output, so
/// both are tracked.
///
/// EOF is detected with a one-line lookahead: `read_line` returns the
/// buffered line and refills the buffer behind it.
pub struct SourceCursor {
    reader: Option<BufReader<File>>,
    exhausted: bool,
    buffer: String,
    source_pos: FilePosition, // position of the last returned line in the original source
    buffer_pos: FilePosition, // position represented by the buffered line
    input_pos: FilePosition,  // physical position in the preprocessor output
    state: TextState,
    wrapped: bool, // text state continued from the previous line
    sink: Rc<dyn DiagSink>,
}

impl SourceCursor {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        Self {
            reader: None,
            exhausted: false,
            buffer: String::new(),
            source_pos: FilePosition::default(),
            buffer_pos: FilePosition::default(),
            input_pos: FilePosition::default(),
            state: TextState::Other,
            wrapped: false,
            sink,
        }
    }

    /// Opens the given file and loads the first cleaned line.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.close();
        let file = File::open(path)
            .with_context(|| format!("could not open file {}", path.display()))?;
        self.reader = Some(BufReader::new(file));
        let name = path.to_string_lossy().into_owned();
        self.source_pos = FilePosition::new(name, 0);
        self.buffer_pos = self.source_pos.clone();
        self.input_pos = self.source_pos.clone();
        self.fetch_next_line();
        Ok(())
    }

    pub fn close(&mut self) {
        self.reader = None;
        self.exhausted = false;
        self.buffer.clear();
        self.source_pos = FilePosition::default();
        self.buffer_pos = FilePosition::default();
        self.input_pos = FilePosition::default();
        self.state = TextState::Other;
        self.wrapped = false;
    }

    /// At end of file when the last line has been read and the buffered
    /// lookahead has been returned.
    pub fn have_eof(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Position of the most recently returned line in the original source.
    pub fn position(&self) -> &FilePosition {
        &self.source_pos
    }

    /// Returns the buffered cleaned line and fetches the next one. The
    /// fetch moves the buffered position, so the position of the returned
    /// line is latched first.
    pub fn read_line(&mut self) -> String {
        let result = std::mem::take(&mut self.buffer);
        self.source_pos = self.buffer_pos.clone();
        self.fetch_next_line();
        result
    }

    fn read_physical_line(&mut self) -> Option<String> {
        let reader = self.reader.as_mut()?;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => {
                self.exhausted = true;
                None
            }
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }

    /// Loads physical lines until a non-empty cleaned line is built. The
    /// file consists of four things: comments, quoted strings,
    /// preprocessor directives, and other text; a state machine splits each
    /// line into runs of one category. Comments and quoted strings may
    /// continue across lines (wrap).
    fn fetch_next_line(&mut self) {
        self.buffer.clear();
        while self.buffer.is_empty() && !self.exhausted {
            let Some(line) = self.read_physical_line() else {
                break;
            };
            self.buffer_pos.incr_line();
            self.input_pos.incr_line();

            // A directive is signaled by the first non-space being a hash,
            // but only outside wrapped comments and string literals.
            if self.state == TextState::Other {
                if let Some(first) = burn_spaces(&line, 0) {
                    if line.as_bytes()[first] == b'#' {
                        self.state = TextState::Preproc;
                        self.wrapped = false;
                    }
                }
            }

            let mut next_state = TextState::Other;
            let mut end: Option<usize> = Some(0);
            while let Some(start) = end {
                match self.state {
                    TextState::Comment => {
                        // Skip the comment opener unless the comment
                        // carried over from the previous line.
                        let from = if self.wrapped { start } else { start + 2 };
                        let close = find_from(&line, "*/", from);
                        self.wrapped = close.is_none();
                        if let Some(c) = close {
                            // search returns the first char of the closer
                            end = Some(c + 2);
                            next_state = TextState::Other;
                        } else {
                            end = None;
                        }
                        // Compilers turn the whole comment into one space.
                        self.buffer.push(' ');
                    }
                    TextState::Quote => {
                        let from = if self.wrapped { start } else { start + 1 };
                        let close = next_close_quote(&line, from);
                        self.wrapped = close.is_none();
                        if let Some(c) = close {
                            // include the closing quote itself
                            self.buffer.push_str(&line[start..c + 1]);
                            next_state = TextState::Other;
                            end = Some(c + 1);
                        } else {
                            self.buffer.push_str(&line[start..]);
                            /* Without an escaped return at the end, either
                            the quote or the escape was left out. GCC
                            assumes the latter, so this code does too. */
                            if esc_newline_pos(&self.buffer, true).is_none() {
                                diag::warn_at(
                                    &*self.sink,
                                    "Unterminated string literal found at ",
                                    &self.buffer_pos,
                                    "",
                                );
                                self.buffer.push('\\');
                            }
                            end = None;
                        }
                    }
                    TextState::Preproc => {
                        // Directives never reach the output; the whole
                        // line is consumed at once.
                        self.handle_preproc(&line);
                        if !self.wrapped {
                            next_state = TextState::Other;
                        }
                        end = None;
                    }
                    TextState::Other => {
                        // The run ends at the earlier of the next comment
                        // and the next open quote.
                        self.wrapped = false;
                        let next_quote = next_open_quote(&line, start);
                        let next_comment = find_from(&line, "/*", start);
                        if next_quote.is_none() && next_comment.is_none() {
                            end = None;
                            self.wrapped = true;
                        } else if next_comment.is_some()
                            && (next_quote.is_none() || next_comment < next_quote)
                        {
                            end = next_comment;
                            next_state = TextState::Comment;
                        } else {
                            end = next_quote;
                            next_state = TextState::Quote;
                        }
                        if self.wrapped {
                            self.buffer.push_str(&line[start..]);
                        } else if let Some(e) = end {
                            if start < e {
                                self.buffer.push_str(&line[start..e]);
                            }
                        }
                    }
                }

                if !self.wrapped {
                    self.state = next_state;
                }
                if let Some(e) = end {
                    if e >= line.len() {
                        end = None;
                    }
                }
            }

            /* Ignore all-whitespace results, and results that are only
            spaces plus an escaped newline outside a string literal. A
            quoted string of all whitespace always holds at least a quote
            or the escape in front of the line end, so it survives. */
            let clear = match burn_spaces(&self.buffer, 0) {
                None => true,
                Some(first) => {
                    esc_newline_pos(&self.buffer, false) == Some(first)
                        && (!self.wrapped || self.state != TextState::Quote)
                }
            };
            if clear {
                self.buffer.clear();
            }
        }
    }

    /// Handles a `#`-prefixed line. Preprocessor output inserts source
    /// locations as `# <digits> "<path>"`; these update the buffered
    /// position. Anything else starting with a hash is a real directive,
    /// meaning the input was not run through the preprocessor: warn and
    /// drop it.
    fn handle_preproc(&mut self, line: &str) {
        let was_wrapped = self.wrapped;
        self.wrapped = esc_newline_pos(line, false).is_some();

        let mut have_location = false;
        // Locations never wrap.
        if !was_wrapped && !self.wrapped {
            have_location = self.try_location(line);
        }

        if !have_location && !was_wrapped {
            diag::warn_at(
                &*self.sink,
                &format!("Preprocessor directive {} ignored on ", line),
                &self.input_pos,
                ". Must gcc -E source files before calling",
            );
        }
    }

    fn try_location(&mut self, line: &str) -> bool {
        let bytes = line.as_bytes();
        let Some(hash) = line.find('#') else {
            return false;
        };
        // actual text of the directive
        let Some(start) = burn_spaces(line, hash + 1) else {
            return false;
        };
        if !bytes[start].is_ascii_digit() {
            return false;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end >= bytes.len() {
            return false; // nothing after the digits
        }
        /* The directive names the location of the next source line.
        Reading that line will increment the counter, so compensate by one
        here. */
        let line_no: u32 = line[start..end].parse().unwrap_or(0);
        let line_no = line_no.saturating_sub(1);

        let Some(quote) = burn_spaces(line, end) else {
            return false;
        };
        if bytes[quote] != b'"' {
            return false;
        }
        let path_start = quote + 1;
        let Some(path_end) = find_from(line, "\"", path_start) else {
            return false;
        };
        if path_end <= path_start {
            return false; // empty file name is illegal
        }
        let file_name = &line[path_start..path_end];
        // Only whitespace may follow the path.
        if burn_spaces(line, path_end + 1).is_some() {
            return false;
        }
        self.buffer_pos = FilePosition::new(file_name, line_no);
        true
    }
}

// Returns the start of the next quoted string: a `"` not directly flanked
// by single quotes, which would make it a char literal.
fn next_open_quote(buf: &str, start: usize) -> Option<usize> {
    let bytes = buf.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b'"'
            && (pos == 0 || bytes[pos - 1] != b'\'')
            && (pos == bytes.len() - 1 || bytes[pos + 1] != b'\'')
        {
            return Some(pos);
        }
        pos += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burn_spaces_finds_first_text() {
        assert_eq!(burn_spaces("  \tx", 0), Some(3));
        assert_eq!(burn_spaces("   ", 0), None);
        assert_eq!(burn_spaces("ab  ", 2), None);
    }

    #[test]
    fn close_quote_skips_escapes() {
        assert_eq!(next_close_quote(r#"ab\"cd"e"#, 0), Some(6));
        assert_eq!(next_close_quote("no quote", 0), None);
    }

    #[test]
    fn esc_newline_ignores_trailing_spaces() {
        assert_eq!(esc_newline_pos("int x; \\  ", false), Some(7));
        assert_eq!(esc_newline_pos("int x;", false), None);
    }

    #[test]
    fn esc_newline_counts_backslash_runs_in_quotes() {
        // odd run escapes the newline, even run is a literal backslash
        assert_eq!(esc_newline_pos(r#""abc\"#, true), Some(4));
        assert_eq!(esc_newline_pos(r#""abc\\"#, true), None);
    }

    #[test]
    fn open_quote_skips_char_literal_quotes() {
        assert_eq!(next_open_quote(r#"c = '"'; s = "x""#, 0), Some(13));
    }
}
