use std::io::Write;
use std::rc::Rc;

use diag::MemorySink;
use lex::{Lexer, Token, TokenKind};

fn lex_all(src: &str) -> Vec<Token> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.i");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(src.as_bytes()).unwrap();
    let mut lx = Lexer::new(Rc::new(MemorySink::new()));
    lx.start(&path).unwrap();
    let mut out = Vec::new();
    while !lx.have_eof() {
        out.push(lx.next_token());
    }
    out
}

fn literals(toks: &[Token]) -> Vec<&str> {
    toks.iter()
        .filter(|t| t.kind == TokenKind::Literal)
        .map(|t| t.lexeme.as_str())
        .collect()
}

#[test]
fn numerics_with_exponent_and_leading_dot() {
    let toks = lex_all("x = 3.25; y = 1E5; z = .5;\n");
    assert_eq!(literals(&toks), vec!["3.25", "1E5", ".5"]);
}

#[test]
fn lowercase_exponent_ends_the_literal() {
    let toks = lex_all("x = 1e5;\n");
    assert_eq!(literals(&toks), vec!["1"]);
    assert!(toks.iter().any(|t| t.kind == TokenKind::Identifier && t.lexeme == "e5"));
}

#[test]
fn string_literal_is_one_token() {
    let toks = lex_all("s = \"a b ; { } ( )\";\n");
    assert_eq!(literals(&toks), vec!["\"a b ; { } ( )\""]);
}

#[test]
fn char_literal_forms_accepted() {
    let toks = lex_all("a = 'c'; b = '\\n'; c = '\\0'; d = '\\101'; e = '\\x4F';\n");
    assert_eq!(
        literals(&toks),
        vec!["'c'", "'\\n'", "'\\0'", "'\\101'", "'\\x4F'"]
    );
}

#[test]
fn malformed_char_literal_degrades_quietly() {
    let toks = lex_all("a = 'ab';\n");
    // the quote falls through to an other-symbol, the guts lex on their own
    assert!(literals(&toks).is_empty());
    assert!(toks.iter().any(|t| t.kind == TokenKind::OtherSymbol && t.lexeme == "'"));
    assert!(toks.iter().any(|t| t.kind == TokenKind::Identifier && t.lexeme == "ab"));
}

#[test]
fn short_hex_escape_is_rejected() {
    let toks = lex_all("a = '\\x4';\n");
    assert!(literals(&toks).is_empty());
}

#[test]
fn sizeof_is_just_an_identifier_to_the_lexer() {
    let toks = lex_all("n = sizeof x;\n");
    let sz = toks.iter().find(|t| t.lexeme == "sizeof").unwrap();
    assert_eq!(sz.kind, TokenKind::Identifier);
}
