use std::cmp::Ordering;
use std::fmt;

use diag::FilePosition;
use lex::{Modifier, Scope, Token, TokenKind};

/// One row of the final report: a function declaration, or a call or
/// reference attributed to its enclosing function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    name: String,
    location: FilePosition,
    declaration: bool,
    caller: String,
    reference: bool,
    file_scope: bool,
}

impl FunctionRecord {
    pub fn new(token: &Token, caller: &str) -> Self {
        let declaration = token.kind == TokenKind::FunctDecl;
        Self {
            name: token.lexeme.clone(),
            location: token.location.clone(),
            declaration,
            caller: if declaration {
                token.lexeme.clone()
            } else {
                caller.to_string()
            },
            reference: !declaration && token.modifier == Modifier::FuncRef,
            file_scope: token.scope == Scope::File,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &FilePosition {
        &self.location
    }

    pub fn is_declaration(&self) -> bool {
        self.declaration
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn is_file_scope(&self) -> bool {
        self.file_scope
    }
}

impl PartialOrd for FunctionRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FunctionRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        // name, then file scope before global, then file-scope records by
        // the file they are scoped to, then declarations before calls,
        // then location
        self.name
            .cmp(&other.name)
            .then_with(|| other.file_scope.cmp(&self.file_scope))
            .then_with(|| {
                if self.file_scope {
                    self.location.file_name().cmp(other.location.file_name())
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| other.declaration.cmp(&self.declaration))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl fmt::Display for FunctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20}  ", self.name)?;
        if self.file_scope {
            write!(f, "file   ")?;
        } else {
            write!(f, "global ")?;
        }
        if self.declaration {
            write!(f, "declared                         ")?;
        } else {
            if self.reference {
                write!(f, "refrenced in ")?;
            } else {
                write!(f, "called from  ")?;
            }
            write!(f, "{:<20}", self.caller)?;
        }
        write!(
            f,
            "  {:<14}  {}",
            self.location.file_name(),
            self.location.line_no()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(lexeme: &str, kind: TokenKind, scope: Scope, file: &str, line: u32) -> Token {
        let mut t = Token::new(lexeme, FilePosition::new(file, line), kind);
        t.scope = scope;
        t
    }

    #[test]
    fn declaration_records_name_themselves_as_caller() {
        let t = token("main", TokenKind::FunctDecl, Scope::Global, "a.c", 3);
        let r = FunctionRecord::new(&t, "whoever");
        assert!(r.is_declaration());
        assert_eq!(r.caller(), "main");
        assert!(!r.is_reference());
        assert!(!r.is_file_scope());
    }

    #[test]
    fn reference_flag_carries_from_modifier() {
        let mut t = token("q", TokenKind::FunctCall, Scope::Global, "a.c", 8);
        t.modifier = Modifier::FuncRef;
        let r = FunctionRecord::new(&t, "main");
        assert!(r.is_reference());
        assert_eq!(r.caller(), "main");
    }

    #[test]
    fn sort_puts_declarations_before_calls_of_same_name() {
        let decl = FunctionRecord::new(&token("f", TokenKind::FunctDecl, Scope::Global, "a.c", 9), "f");
        let call = FunctionRecord::new(&token("f", TokenKind::FunctCall, Scope::Global, "a.c", 2), "main");
        assert!(decl < call);
    }

    #[test]
    fn sort_puts_file_scope_first() {
        let file = FunctionRecord::new(&token("f", TokenKind::FunctDecl, Scope::File, "z.c", 1), "f");
        let global = FunctionRecord::new(&token("f", TokenKind::FunctDecl, Scope::Global, "a.c", 1), "f");
        assert!(file < global);
    }

    #[test]
    fn sort_orders_names_alphabetically() {
        let a = FunctionRecord::new(&token("alpha", TokenKind::FunctCall, Scope::Global, "a.c", 5), "m");
        let b = FunctionRecord::new(&token("beta", TokenKind::FunctDecl, Scope::Global, "a.c", 1), "beta");
        assert!(a < b);
    }

    #[test]
    fn report_row_layout() {
        let r = FunctionRecord::new(&token("f", TokenKind::FunctCall, Scope::Global, "a.c", 12), "main");
        let row = r.to_string();
        assert_eq!(&row[..22], format!("{:<20}  ", "f"));
        assert!(row.contains("global called from  main"));
        assert!(row.trim_end().ends_with("12"));
    }
}
