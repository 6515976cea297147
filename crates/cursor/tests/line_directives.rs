use std::io::Write;
use std::rc::Rc;

use cursor::SourceCursor;
use diag::MemorySink;

fn cursor_over(content: &str) -> (SourceCursor, Rc<MemorySink>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.i");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    let sink = Rc::new(MemorySink::new());
    let mut cur = SourceCursor::new(sink.clone());
    cur.open(&path).unwrap();
    (cur, sink, dir)
}

#[test]
fn directive_resets_file_and_line() {
    let (mut cur, sink, _dir) = cursor_over("# 12 \"lib.c\"\nint x;\n");
    let line = cur.read_line();
    assert_eq!(line, "int x;");
    assert_eq!(cur.position().file_name(), "lib.c");
    assert_eq!(cur.position().line_no(), 12);
    assert!(sink.messages().is_empty());
}

#[test]
fn directive_with_trailing_text_is_ignored() {
    let (mut cur, sink, _dir) = cursor_over("# 5 \"hdr.h\" 1 3\nint y;\n");
    let line = cur.read_line();
    assert_eq!(line, "int y;");
    // anything after the quoted path disqualifies the line; the position
    // keeps counting in the input file
    assert_ne!(cur.position().file_name(), "hdr.h");
    assert_eq!(cur.position().line_no(), 2);
    assert!(sink.contains("Preprocessor directive"));
    assert!(sink.contains("ignored"));
}

#[test]
fn counting_continues_after_directive() {
    let (mut cur, _sink, _dir) = cursor_over("# 100 \"z.c\"\nint a;\nint b;\n");
    assert_eq!(cur.read_line(), "int a;");
    assert_eq!(cur.position().line_no(), 100);
    assert_eq!(cur.read_line(), "int b;");
    assert_eq!(cur.position().line_no(), 101);
}

#[test]
fn stray_directive_warns_and_is_dropped() {
    let (mut cur, sink, _dir) = cursor_over("#define MAX 10\nint x;\n");
    assert_eq!(cur.read_line(), "int x;");
    assert!(sink.contains("Preprocessor directive"));
    assert!(sink.contains("ignored"));
}

#[test]
fn open_failure_is_an_error() {
    let sink = Rc::new(MemorySink::new());
    let mut cur = SourceCursor::new(sink);
    let err = cur.open(std::path::Path::new("/no/such/file.i")).unwrap_err();
    assert!(err.to_string().contains("could not open file"));
}
