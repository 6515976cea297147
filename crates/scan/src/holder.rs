use std::collections::BTreeMap;

use lex::{Scope, Token, TokenKind};

use crate::record::FunctionRecord;
use crate::ScanError;

/// Buffers function calls whose enclosing scope is not yet known. Holds
/// are keyed by lexeme and released when the matching declaration fixes
/// the scope, or all at once with global scope at end of file. Released
/// holds become `FunctionRecord`s on a stack the caller drains one at a
/// time.
#[derive(Default)]
pub struct CallHolder {
    held: BTreeMap<String, Vec<(Token, String)>>,
    released: Vec<FunctionRecord>,
}

impl CallHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.held.clear();
        self.released.clear();
    }

    /// True while released records await draining.
    pub fn releasing(&self) -> bool {
        !self.released.is_empty()
    }

    /// True once every held call has been released and drained.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty() && !self.releasing()
    }

    /// Pops one released record.
    pub fn next_release(&mut self) -> Option<FunctionRecord> {
        self.released.pop()
    }

    /// Holds a call if its scope is still unknown; returns whether it was
    /// held. Holding while a release is in progress means the caller
    /// skipped draining, which is a logic error, not an input problem.
    pub fn hold_if_needed(&mut self, token: &Token, caller: &str) -> Result<bool, ScanError> {
        if token.kind != TokenKind::FunctCall || token.scope != Scope::Unknown {
            return Ok(false);
        }
        if self.releasing() {
            return Err(ScanError::DoubleRelease);
        }
        self.held
            .entry(token.lexeme.clone())
            .or_default()
            .push((token.clone(), caller.to_string()));
        Ok(true)
    }

    /// A declaration fixes the scope of every held call with its name.
    pub fn release_hold(&mut self, decl: &Token) {
        if decl.kind != TokenKind::FunctDecl {
            return;
        }
        if let Some(entries) = self.held.remove(&decl.lexeme) {
            for (mut token, caller) in entries {
                token.scope = decl.scope;
                self.released.push(FunctionRecord::new(&token, &caller));
            }
        }
    }

    /// End of file: calls still held have no declaration in this file, so
    /// they must be declared elsewhere; release them with global scope.
    pub fn proc_eof(&mut self) -> Option<FunctionRecord> {
        if !self.held.is_empty() {
            let held = std::mem::take(&mut self.held);
            for (_, entries) in held {
                for (mut token, caller) in entries {
                    token.scope = Scope::Global;
                    self.released.push(FunctionRecord::new(&token, &caller));
                }
            }
        }
        self.next_release()
    }
}
