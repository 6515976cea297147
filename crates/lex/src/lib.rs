pub mod buffer;
mod lexer;
pub mod token;

pub use buffer::TokenBuffer;
pub use lexer::Lexer;
pub use token::{Modifier, Scope, Token, TokenKind};
