mod holder;
mod indexer;
mod recognizer;
mod record;
mod symbols;

pub use holder::CallHolder;
pub use indexer::Indexer;
pub use recognizer::Recognizer;
pub use record::FunctionRecord;
pub use symbols::SymbolTable;

use diag::DiagSink;
use lex::Token;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Holding new call tokens while resolved ones await release is a
    /// logic error in the driving loop, not a property of the input.
    #[error("internal error, double release of held function tokens")]
    DoubleRelease,
}

pub(crate) fn warn_token(sink: &dyn DiagSink, token: &Token, lead: &str, trail: &str) {
    diag::warn_lexeme(sink, lead, &token.lexeme, &token.location, trail);
}
