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
    drop(idx); // end-of-run namespace sweep
    (records, sink)
}

fn find<'a>(records: &'a [FunctionRecord], name: &str, declaration: bool) -> &'a FunctionRecord {
    records
        .iter()
        .find(|r| r.name() == name && r.is_declaration() == declaration)
        .unwrap_or_else(|| panic!("no record for {} (declaration={})", name, declaration))
}

#[test]
fn prototype_then_call() {
    let (records, sink) = index("int f(int);\nint main(){ f(1); }\n");
    assert_eq!(records.len(), 2);
    let main = find(&records, "main", true);
    assert!(!main.is_file_scope());
    let call = find(&records, "f", false);
    assert_eq!(call.caller(), "main");
    assert!(!call.is_file_scope());
    assert!(!call.is_reference());
    assert!(sink.messages().is_empty(), "{:?}", sink.messages());
}

#[test]
fn call_before_prototype_warns_and_reports() {
    let (records, sink) = index("int main(){ g(1); }\nint g(int x){ return x; }\n");
    assert!(sink.contains("Function call g"));
    assert!(sink.contains("has no prototype"));
    let _ = find(&records, "main", true);
    let g_decl = find(&records, "g", true);
    assert!(!g_decl.is_file_scope());
    let g_call = find(&records, "g", false);
    assert_eq!(g_call.caller(), "main");
    assert!(!g_call.is_file_scope());
}

#[test]
fn call_held_until_static_declaration_gets_file_scope() {
    let (records, _sink) = index("int main(){ h(); }\nstatic int h(void){ return 0; }\n");
    let h_call = find(&records, "h", false);
    assert_eq!(h_call.caller(), "main");
    assert!(h_call.is_file_scope());
}

#[test]
fn call_with_no_declaration_released_as_global_at_eof() {
    let (records, _sink) = index("int main(){ missing(); }\n");
    let call = find(&records, "missing", false);
    assert_eq!(call.caller(), "main");
    assert!(!call.is_file_scope());
}

#[test]
fn struct_field_is_not_a_call() {
    let (records, _sink) = index("struct S{int x;} s;\nint f(){ s.x; }\n");
    assert_eq!(records.len(), 1);
    let f = find(&records, "f", true);
    assert!(f.is_declaration());
}

#[test]
fn function_pointer_initializer_reports_a_reference() {
    let (records, _sink) = index("void q(void);\nvoid (*p)(void) = &q;\n");
    let q = find(&records, "q", false);
    assert!(q.is_reference());
    assert!(!q.is_file_scope());
}

#[test]
fn reference_inside_call_arguments() {
    let (records, _sink) = index(
        "void cb(void);\nint reg(void (*f)(void));\nint main(){ reg(&cb); }\n",
    );
    let cb = find(&records, "cb", false);
    assert!(cb.is_reference());
    assert_eq!(cb.caller(), "main");
    let reg = find(&records, "reg", false);
    assert!(!reg.is_reference());
}

#[test]
fn control_statement_arguments_do_not_end_the_statement() {
    let (records, sink) = index(
        "int f(int);\nint main(){ int i; for (i = 0; i < 3; i = i + 1) f(i); }\n",
    );
    let calls: Vec<_> = records.iter().filter(|r| !r.is_declaration()).collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "f");
    assert!(sink.messages().is_empty(), "{:?}", sink.messages());
}

#[test]
fn unfinished_call_argument_list_warns() {
    let (_records, sink) = index("int main(){ f(1; }\n");
    assert!(sink.contains("Call of function f"));
    assert!(sink.contains("is incomplete"));
}

#[test]
fn call_as_struct_member_warns_but_reports() {
    let (records, sink) = index("int main(){ s.f(); }\n");
    assert!(sink.contains("is an element of a structured type"));
    let f = find(&records, "f", false);
    assert_eq!(f.caller(), "main");
}

#[test]
fn caller_attribution_follows_the_enclosing_function() {
    let (records, _sink) = index(
        "void a(void){ shared(); }\nvoid b(void){ shared(); }\nvoid shared(void){}\n",
    );
    let callers: Vec<&str> = records
        .iter()
        .filter(|r| r.name() == "shared" && !r.is_declaration())
        .map(|r| r.caller())
        .collect();
    assert_eq!(callers.len(), 2);
    assert!(callers.contains(&"a"));
    assert!(callers.contains(&"b"));
}

#[test]
fn declaration_records_preserve_source_order() {
    let (records, _sink) = index("void a(void){}\nvoid b(void){}\nvoid c(void){}\n");
    let decls: Vec<&str> = records
        .iter()
        .filter(|r| r.is_declaration())
        .map(|r| r.name())
        .collect();
    assert_eq!(decls, vec!["a", "b", "c"]);
}

#[test]
fn every_call_token_becomes_exactly_one_record() {
    let (records, _sink) = index(
        "int f(int);\nint main(){ f(1); f(2); g(3); }\nint g(int x){ return f(x); }\n",
    );
    let f_calls = records
        .iter()
        .filter(|r| r.name() == "f" && !r.is_declaration())
        .count();
    let g_calls = records
        .iter()
        .filter(|r| r.name() == "g" && !r.is_declaration())
        .count();
    assert_eq!(f_calls, 3);
    assert_eq!(g_calls, 1);
}
