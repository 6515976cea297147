use anyhow::Result;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use diag::DiagSink;

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// One-pass token stream with unbounded lookahead. The lookahead cursor is
/// a monotone index into an owned deque, so appending freshly lexed tokens
/// never invalidates it. Position 0 is "before-first"; `next_token`
/// resets the cursor.
pub struct TokenBuffer {
    file: Lexer,
    held: VecDeque<Token>,
    look: usize, // tokens observed by the lookahead cursor
}

impl TokenBuffer {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        Self {
            file: Lexer::new(sink),
            held: VecDeque::new(),
            look: 0,
        }
    }

    /// Opens the buffer on the given file.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        self.held.clear();
        self.look = 0;
        self.file.start(path)
    }

    /// Consumes and returns the next token. Reading a token invalidates
    /// the old lookahead.
    pub fn next_token(&mut self) -> Token {
        let token = match self.held.pop_front() {
            Some(t) => t,
            None => self.file.next_token(),
        };
        self.reset_lookahead();
        token
    }

    /// Advances the lookahead cursor one token, lexing as needed.
    pub fn next_lookahead(&mut self) -> Token {
        if self.look == self.held.len() {
            let t = self.file.next_token();
            self.held.push_back(t);
        }
        self.look += 1;
        self.held[self.look - 1].clone()
    }

    /// The token under the lookahead cursor, or no-token before the first
    /// lookahead.
    pub fn last_lookahead(&self) -> Token {
        if self.look == 0 {
            Token::none()
        } else {
            self.held[self.look - 1].clone()
        }
    }

    /// Moves the lookahead cursor back before the first buffered token so
    /// it can be observed again.
    pub fn reset_lookahead(&mut self) {
        self.look = 0;
    }

    /// True when every token from the source has been read.
    pub fn have_eof(&self) -> bool {
        self.file.have_eof()
            && (self.held.is_empty() || self.held.front().map(|t| t.kind) == Some(TokenKind::Eof))
    }
}
