use anyhow::Result;
use std::path::Path;
use std::rc::Rc;

use cursor::{burn_spaces, esc_newline_pos, next_close_quote, SourceCursor};
use diag::{DiagSink, FilePosition};

use crate::token::{Token, TokenKind};

/* Classification:
   &                     ampersand
   ->  .                 field access
   ;  { } ( )            their own kinds
   quoted string         literal
   digits (or .digits)   literal
   'c' forms             literal
   alpha then alnum*     identifier
   * [ ] , space tab     decl symbol
   anything else         other symbol
*/

fn is_decl_char(c: u8) -> bool {
    matches!(c, b'*' | b'[' | b']' | b',' | b' ' | b'\t')
}

fn is_other_char(c: u8) -> bool {
    matches!(
        c,
        b'`' | b'!' | b'@' | b'#' | b'$' | b'%' | b'^' | b'+' | b'=' | b'|' | b'\\' | b'<'
            | b'>' | b'?' | b'/'
    )
}

fn is_ident_char(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

fn is_numeric_char(c: u8) -> bool {
    c == b'.' || c.is_ascii_digit()
}

fn is_upper_hex(c: u8) -> bool {
    c.is_ascii_digit() || (b'A'..=b'F').contains(&c)
}

/// First position at or after `from` whose byte fails the predicate.
fn first_not(buf: &str, from: usize, pred: impl Fn(u8) -> bool) -> Option<usize> {
    let bytes = buf.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if !pred(bytes[i]) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Converts the cursor's cleaned lines into classified tokens. A token's
/// text may wrap between lines, requiring a file read before the token
/// finishes; the location must reflect where the token starts, so it is
/// cached here and only updated between tokens.
pub struct Lexer {
    file: SourceCursor,
    buffer: String,
    char_ptr: usize, // location of data to tokenize
    location: FilePosition,
    load_line_data: bool, // line data must be refreshed after this token
    new_line_pos: usize,  // where the most recently appended line begins
}

impl Lexer {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        Self {
            file: SourceCursor::new(sink),
            buffer: String::new(),
            char_ptr: 0,
            location: FilePosition::default(),
            load_line_data: false,
            new_line_pos: 0,
        }
    }

    fn init(&mut self) {
        self.buffer.clear();
        self.char_ptr = 0;
        self.location = FilePosition::default();
        self.load_line_data = false;
        self.new_line_pos = 0;
    }

    /// Starts the lexer on the named file.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        self.init();
        self.file.open(path)?;
        self.reload_buffer(false);
        self.location = self.file.position().clone();
        Ok(())
    }

    /// True once the entire file has been tokenized.
    pub fn have_eof(&self) -> bool {
        self.file.have_eof() && self.char_ptr >= self.buffer.len()
    }

    /// True if the indexed char is the escape of a wrapped line.
    fn is_line_wrap(&self, pos: usize, multi_line_quote: bool) -> bool {
        if self.file.have_eof() {
            return false; // on the last line nothing can wrap
        }
        if pos >= self.buffer.len() {
            return false;
        }
        if self.buffer.as_bytes()[pos] != b'\\' {
            return false;
        }
        esc_newline_pos(&self.buffer, multi_line_quote) == Some(pos)
    }

    /// Drops consumed text (and any trailing escape) and appends the next
    /// cleaned line so an in-flight token can continue matching.
    fn reload_buffer(&mut self, multi_line_quote: bool) {
        let num_keep = if self.char_ptr >= self.buffer.len() {
            0
        } else {
            let first_ignore =
                esc_newline_pos(&self.buffer, multi_line_quote).unwrap_or(self.buffer.len());
            first_ignore.saturating_sub(self.char_ptr)
        };
        if num_keep > 0 {
            self.buffer = self.buffer[self.char_ptr..self.char_ptr + num_keep].to_string();
        } else {
            self.buffer.clear();
        }
        self.new_line_pos = num_keep;
        if !self.file.have_eof() {
            let temp = self.file.read_line();
            self.buffer.push_str(&temp);
            self.load_line_data = true;
        }
        self.char_ptr = 0;
    }

    /// Chars with no token of their own, split into those allowed inside
    /// declarations and the rest. The recognizer ignores consecutive chars
    /// of this kind, so runs consolidate into one token.
    fn handle_other_chars(&mut self) -> Token {
        let c = self.buffer.as_bytes()[self.char_ptr];
        let (kind, probe) = if is_decl_char(c) {
            (
                TokenKind::DeclSymbol,
                first_not(&self.buffer, self.char_ptr + 1, is_decl_char),
            )
        } else {
            (
                TokenKind::OtherSymbol,
                first_not(&self.buffer, self.char_ptr + 1, |b| {
                    is_decl_char(b) || is_other_char(b)
                }),
            )
        };
        let end = match probe {
            None => self.buffer.len() - 1,
            Some(e) => e - 1,
        };
        let lexeme = self.buffer[self.char_ptr..=end].to_string();
        self.char_ptr = end;
        Token::new(lexeme, self.location.clone(), kind)
    }

    /// Numeric literal: digits and dots, with at most one `E` exponent.
    fn get_numeric(&mut self) -> Token {
        let mut end = self.char_ptr;
        let mut seen_e = false;
        let last;
        loop {
            let probe = if end >= self.buffer.len() {
                None
            } else {
                first_not(&self.buffer, end, is_numeric_char)
            };
            match probe {
                None => {
                    last = self.buffer.len() - 1;
                    break;
                }
                Some(i) if self.is_line_wrap(i, false) => {
                    self.reload_buffer(false);
                    // resume matching where the appended text begins
                    end = self.new_line_pos;
                }
                Some(i) if self.buffer.as_bytes()[i] == b'E' && !seen_e => {
                    end = i + 1;
                    seen_e = true;
                }
                Some(i) => {
                    last = i - 1;
                    break;
                }
            }
        }
        let lexeme = self.buffer[self.char_ptr..=last].to_string();
        self.char_ptr = last;
        Token::new(lexeme, self.location.clone(), TokenKind::Literal)
    }

    /// Quoted string literal; an unclosed quote pulls the next line.
    fn get_quoted_string(&mut self) -> Token {
        let mut end = self.char_ptr + 1;
        let close;
        loop {
            match next_close_quote(&self.buffer, end) {
                None if !self.file.have_eof() => {
                    self.reload_buffer(true);
                    end = self.new_line_pos;
                }
                other => {
                    close = other;
                    break;
                }
            }
        }
        let stop = close.unwrap_or(self.buffer.len());
        let upper = (stop + 1).min(self.buffer.len());
        let lexeme = self.buffer[self.char_ptr..upper].to_string();
        self.char_ptr = stop;
        Token::new(lexeme, self.location.clone(), TokenKind::Literal)
    }

    fn get_identifier(&mut self) -> Token {
        // The first char has different rules from the rest.
        let mut lexeme = String::new();
        lexeme.push(self.buffer.as_bytes()[self.char_ptr] as char);
        self.char_ptr += 1;
        let mut end = self.char_ptr;
        let last;
        loop {
            let probe = if end >= self.buffer.len() {
                None
            } else {
                first_not(&self.buffer, end, is_ident_char)
            };
            match probe {
                None => {
                    last = self.buffer.len();
                    break;
                }
                Some(i) if self.is_line_wrap(i, false) => {
                    self.reload_buffer(false);
                    end = self.new_line_pos;
                }
                Some(i) => {
                    last = i - 1;
                    break;
                }
            }
        }
        if last >= self.char_ptr {
            let upper = (last + 1).min(self.buffer.len());
            lexeme.push_str(&self.buffer[self.char_ptr..upper]);
        }
        self.char_ptr = last;
        Token::new(lexeme, self.location.clone(), TokenKind::Identifier)
    }

    /// A minus may start the `->` field operator.
    fn handle_minus(&mut self) -> Token {
        if self.char_ptr == self.buffer.len() - 1 {
            return Token::new("-", self.location.clone(), TokenKind::OtherSymbol);
        }
        if self.is_line_wrap(self.char_ptr + 1, false) {
            self.reload_buffer(false);
        }
        if self.buffer.as_bytes().get(self.char_ptr + 1) == Some(&b'>') {
            let lexeme = self.buffer[self.char_ptr..self.char_ptr + 2].to_string();
            self.char_ptr += 1;
            Token::new(lexeme, self.location.clone(), TokenKind::FieldAccess)
        } else {
            self.handle_other_chars()
        }
    }

    /// `&&` is the boolean AND, not a potential reference operator. The
    /// recognizer splits bitwise AND from a reference itself.
    fn handle_ampersand(&mut self) -> Token {
        if self.char_ptr == self.buffer.len() - 1 {
            return Token::new("&", self.location.clone(), TokenKind::Ampersand);
        }
        if self.is_line_wrap(self.char_ptr + 1, false) {
            self.reload_buffer(false);
        }
        if self.buffer.as_bytes().get(self.char_ptr + 1) == Some(&b'&') {
            let lexeme = self.buffer[self.char_ptr..self.char_ptr + 2].to_string();
            self.char_ptr += 1;
            Token::new(lexeme, self.location.clone(), TokenKind::OtherSymbol)
        } else {
            Token::new("&", self.location.clone(), TokenKind::Ampersand)
        }
    }

    /// Char literal, one of: `'c'`, `'\c'`, `'\0'`, `'\ooo'`, `'\xhh'`.
    /// A state machine keyed on lexeme length; malformed sequences degrade
    /// to an other-symbol without error.
    fn handle_single_quote(&mut self) -> Token {
        let mut have_error = false;
        let mut have_value = false;
        let mut have_escape = false;
        let mut have_hex = false;
        let mut have_oct = false;
        let mut have_zero = false;
        let mut length: usize = 1;

        while !have_value && !have_error {
            length += 1;
            if self.char_ptr + length - 1 >= self.buffer.len() {
                have_error = true;
            } else if self.is_line_wrap(self.char_ptr + length - 1, true) {
                self.reload_buffer(true);
                length -= 1; // the escape was burned; shrink to compensate
            } else {
                let test = self.buffer.as_bytes()[self.char_ptr + length - 1];
                match length {
                    2 => {
                        if test == b'\'' {
                            have_error = true;
                        } else if test == b'\\' {
                            have_escape = true;
                        }
                    }
                    3 => {
                        if !have_escape {
                            if test == b'\'' {
                                have_value = true;
                            } else {
                                have_error = true;
                            }
                        } else if test == b'0' {
                            /* A zero can start an octal number or be the
                            NUL escape; the next char tells which. */
                            have_zero = true;
                        } else if test.is_ascii_digit() {
                            have_oct = true;
                        } else if test == b'x' {
                            have_hex = true;
                        } else if !matches!(
                            test,
                            b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' | b'\\' | b'?' | b'"'
                                | b'\''
                        ) {
                            have_error = true;
                        }
                    }
                    4 => {
                        if have_zero && test.is_ascii_digit() {
                            have_oct = true; // zero was the first octal digit
                        }
                        if have_oct {
                            have_error = !test.is_ascii_digit();
                        } else if have_hex {
                            have_error = !is_upper_hex(test);
                        } else if have_escape && test == b'\'' {
                            have_value = true;
                        } else {
                            have_error = true;
                        }
                    }
                    5 => {
                        if have_oct {
                            have_error = !test.is_ascii_digit();
                        } else if have_hex {
                            have_error = !is_upper_hex(test);
                        } else {
                            have_error = true;
                        }
                    }
                    6 => {
                        if (have_hex || have_oct) && test == b'\'' {
                            have_value = true;
                        } else {
                            have_error = true;
                        }
                    }
                    _ => have_error = true,
                }
            }
        }

        if have_value {
            let lexeme = self.buffer[self.char_ptr..self.char_ptr + length].to_string();
            self.char_ptr += length - 1;
            Token::new(lexeme, self.location.clone(), TokenKind::Literal)
        } else {
            self.handle_other_chars()
        }
    }

    /// Lexes and returns the next token.
    pub fn next_token(&mut self) -> Token {
        if self.have_eof() {
            let mut pos = self.location.clone(); // last line of the file
            pos.incr_line();
            return Token::new("", pos, TokenKind::Eof);
        }

        let c = self.buffer.as_bytes()[self.char_ptr];
        let token = if c.is_ascii_alphabetic() || c == b'_' || c == b'~' {
            self.get_identifier()
        } else if c.is_ascii_digit() {
            self.get_numeric()
        } else {
            match c {
                b'"' => self.get_quoted_string(),
                b'-' => self.handle_minus(),
                b'\'' => self.handle_single_quote(),
                b'&' => self.handle_ampersand(),
                b'.' => {
                    // a leading decimal point may start a numeric
                    if self.char_ptr == self.buffer.len() - 1
                        || !self.buffer.as_bytes()[self.char_ptr + 1].is_ascii_digit()
                    {
                        Token::new(".", self.location.clone(), TokenKind::FieldAccess)
                    } else {
                        self.get_numeric()
                    }
                }
                b';' => Token::new(";", self.location.clone(), TokenKind::Semicolon),
                b'{' => Token::new("{", self.location.clone(), TokenKind::OpenBrace),
                b'}' => Token::new("}", self.location.clone(), TokenKind::CloseBrace),
                b'(' => Token::new("(", self.location.clone(), TokenKind::OpenParen),
                b')' => Token::new(")", self.location.clone(), TokenKind::CloseParen),
                _ => self.handle_other_chars(),
            }
        };

        // Find the next char to process.
        self.char_ptr += 1; // move off the previous token
        let mut have_char = false;
        while !have_char && (!self.file.have_eof() || self.char_ptr < self.buffer.len()) {
            if self.char_ptr < self.buffer.len() {
                self.char_ptr =
                    burn_spaces(&self.buffer, self.char_ptr).unwrap_or(self.buffer.len());
            }
            if self.is_line_wrap(self.char_ptr, false) {
                self.char_ptr = self.buffer.len();
            }
            if self.char_ptr >= self.buffer.len() {
                self.reload_buffer(false);
            } else {
                have_char = true;
            }
        }

        // Update position information once the consumed text is behind us.
        if self.load_line_data && self.char_ptr >= self.new_line_pos {
            self.location = self.file.position().clone();
            self.load_line_data = false;
        }
        token
    }
}
