use anyhow::Result;
use std::path::Path;
use std::rc::Rc;

use diag::DiagSink;
use lex::{Token, TokenKind};

use crate::holder::CallHolder;
use crate::recognizer::Recognizer;
use crate::record::FunctionRecord;
use crate::ScanError;

/// Drives the recognizer and the call holder over one translation unit at
/// a time, surfacing finished `FunctionRecord`s. A declaration names the
/// current function and releases holds on calls to it; calls whose scope
/// is unknown wait in the holder.
pub struct Indexer {
    recognizer: Recognizer,
    current_function: String,
    holder: CallHolder,
}

impl Indexer {
    pub fn new(sink: Rc<dyn DiagSink>) -> Self {
        Self {
            recognizer: Recognizer::new(sink),
            current_function: "NONE".to_string(),
            holder: CallHolder::new(),
        }
    }

    /// Starts the indexer on the given file, resetting per-unit state.
    /// Leftover global names from the previous unit are cleared, which
    /// reports its unmatched static prototypes.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        self.current_function = "NONE".to_string();
        self.holder.reset();
        self.recognizer.start(path)
    }

    /// True once the file is processed and every hold is drained.
    pub fn have_eof(&self) -> bool {
        self.recognizer.have_eof() && self.holder.is_empty()
    }

    /// Returns the next function record in the input.
    pub fn next_function(&mut self) -> Result<FunctionRecord, ScanError> {
        if let Some(record) = self.holder.next_release() {
            return Ok(record);
        }

        let mut have_funct = false;
        let mut funct = Token::none();
        while !have_funct && !self.recognizer.have_eof() {
            funct = self.recognizer.next_function();
            if funct.kind == TokenKind::FunctDecl {
                // now processing a new function
                self.holder.release_hold(&funct);
                self.current_function = funct.lexeme.clone();
                have_funct = true;
            } else if !self.holder.hold_if_needed(&funct, &self.current_function)? {
                have_funct = true;
            }
        }

        if have_funct {
            Ok(FunctionRecord::new(&funct, &self.current_function))
        } else {
            Ok(self
                .holder
                .proc_eof()
                .unwrap_or_else(|| FunctionRecord::new(&Token::none(), "NONE")))
        }
    }
}
