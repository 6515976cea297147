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

#[test]
fn identifier_continues_across_escaped_newline() {
    let toks = lex_all("int foo\\\nbar;\n");
    let id = toks.iter().find(|t| t.lexeme == "foobar").unwrap();
    assert_eq!(id.kind, TokenKind::Identifier);
    // a continued token keeps the position of its first line
    assert_eq!(id.location.line_no(), 1);
}

#[test]
fn numeric_continues_across_escaped_newline() {
    let toks = lex_all("x = 123\\\n456;\n");
    let lit = toks.iter().find(|t| t.kind == TokenKind::Literal).unwrap();
    assert_eq!(lit.lexeme, "123456");
    assert_eq!(lit.location.line_no(), 1);
}

#[test]
fn string_continues_across_escaped_newline() {
    let toks = lex_all("s = \"hello \\\nworld\";\n");
    let lit = toks.iter().find(|t| t.kind == TokenKind::Literal).unwrap();
    assert_eq!(lit.lexeme, "\"hello world\"");
    assert_eq!(lit.location.line_no(), 1);
}

#[test]
fn token_after_continuation_reports_its_own_line() {
    let toks = lex_all("int foo\\\nbar; int tail;\n");
    let tail = toks.iter().find(|t| t.lexeme == "tail").unwrap();
    assert_eq!(tail.location.line_no(), 2);
}

#[test]
fn escaped_newline_between_tokens_is_transparent() {
    let toks = lex_all("int a \\\n = 3;\n");
    let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::OtherSymbol,
            TokenKind::Literal,
            TokenKind::Semicolon,
        ]
    );
}
