use std::io::Write;
use std::rc::Rc;

use diag::MemorySink;
use scan::{FunctionRecord, Indexer};

fn index(src: &str) -> (Vec<FunctionRecord>, Rc<MemorySink>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.i");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(src.as_bytes()).unwrap();
    let sink = Rc::new(MemorySink::new());
    let mut idx = Indexer::new(sink.clone());
    idx.start(&path).unwrap();
    let mut records = Vec::new();
    while !idx.have_eof() {
        records.push(idx.next_function().unwrap());
    }
    drop(idx);
    (records, sink)
}

#[test]
fn variable_then_function_prefers_the_function() {
    let (_records, sink) = index("int x;\nint x(void);\n");
    assert!(sink.contains("Variable x"));
    assert!(sink.contains("uses name previously used as a function"));
}

#[test]
fn duplicate_prototype_warns() {
    let (_records, sink) = index("int f(int);\nint f(int);\n");
    assert!(sink.contains("Duplicate prototype of f"));
}

#[test]
fn duplicate_declaration_warns() {
    let (_records, sink) = index("int f(void){}\nint f(void){}\n");
    assert!(sink.contains("Duplicate declaration of f"));
}

#[test]
fn prototype_after_declaration_warns() {
    let (_records, sink) = index("int f(void){}\nint f(void);\n");
    assert!(sink.contains("Prototype for f"));
    assert!(sink.contains("occurs after declaration"));
}

#[test]
fn static_prototype_after_global_prototype_warns() {
    let (_records, sink) = index("int f(void);\nstatic int f(void);\nint f(void){}\n");
    assert!(sink.contains("Static function f"));
    assert!(sink.contains("occurs after global prototype"));
}

#[test]
fn local_variable_shadowing_a_function_warns() {
    let (_records, sink) = index("int f(void);\nint main(){ int f; f = 3; }\n");
    assert!(sink.contains("Local variable f"));
    assert!(sink.contains("shadows function with same name in outer scope"));
}

#[test]
fn unmatched_static_prototype_reported_at_end() {
    let (records, sink) = index("static int h(void);\nint main(){}\n");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name(), "main");
    assert!(sink.contains("Static prototype of h"));
    assert!(sink.contains("has no matching declaration"));
}

#[test]
fn matched_static_prototype_is_not_reported() {
    let (_records, sink) = index("static int h(void);\nstatic int h(void){ return 0; }\n");
    assert!(!sink.contains("has no matching declaration"));
}

#[test]
fn globals_reset_between_translation_units() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("one.i");
    std::fs::File::create(&first)
        .unwrap()
        .write_all(b"static int h(void);\nint f(void){}\n")
        .unwrap();
    let second = dir.path().join("two.i");
    std::fs::File::create(&second)
        .unwrap()
        .write_all(b"int f(void){}\n")
        .unwrap();

    let sink = Rc::new(MemorySink::new());
    let mut idx = Indexer::new(sink.clone());
    let mut records = Vec::new();
    for path in [&first, &second] {
        idx.start(path).unwrap();
        while !idx.have_eof() {
            records.push(idx.next_function().unwrap());
        }
    }
    drop(idx);

    // the second unit's f does not collide with the first unit's
    assert!(!sink.contains("Duplicate declaration"));
    // the unmatched static prototype surfaced when the first unit closed
    assert!(sink.contains("Static prototype of h"));
    assert_eq!(records.iter().filter(|r| r.name() == "f").count(), 2);
}

#[test]
fn declaration_inside_another_function_warns() {
    let (_records, sink) = index("int main(){ int g(void); }\n");
    assert!(sink.contains("Prototype of function g"));
    assert!(sink.contains("occurs within another function"));
}

#[test]
fn incomplete_prototype_warns() {
    let (_records, sink) = index("int f(int\nint main(){}\n");
    assert!(sink.contains("is incomplete"));
}
