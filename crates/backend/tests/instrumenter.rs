use std::{fs, path::PathBuf, sync::Arc};

use adana_backend::{
    analyze,
    instrumentation::{BranchKind, EntryKind},
    runtime::{Object, Value},
    CoverageReport, CoverageStore, Error, Instrumenter, Interpreter, Metadata, RawCoverage,
    RuntimeError,
};
use adana_syntax::{
    ast::{Expr, ExprKind, Program, Stmt},
    parse, print, PrintOptions,
};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata/fixtures").join(name);
    fs::read_to_string(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()))
}

struct Outcome {
    metadata: Metadata,
    raw: RawCoverage,
    report: CoverageReport,
    result: Result<Value, RuntimeError>,
    output: Vec<String>,
}

impl Outcome {
    fn statements(&self) -> Vec<u64> {
        self.report.statements.iter().map(|s| s.count).collect()
    }

    fn branches(&self) -> Vec<u64> {
        self.report.branches.iter().map(|b| b.count).collect()
    }

    fn functions(&self) -> Vec<u64> {
        self.report.functions.iter().map(|f| f.count).collect()
    }
}

fn run_program(name: &str, mut program: Program) -> Outcome {
    let metadata = Instrumenter::new(name).instrument(&mut program).expect("instrumentation failed");
    let store = Arc::new(CoverageStore::new());
    let mut interpreter = Interpreter::new(store.clone());
    let result = interpreter.run(&program);
    let raw = store.snapshot(name).unwrap_or_default();
    let report = analyze(&raw, &metadata).expect("analysis failed");
    Outcome { metadata, raw, report, result, output: interpreter.take_output() }
}

fn run_fixture(name: &str) -> Outcome {
    let program = parse(&fixture(name)).expect("fixture does not parse");
    run_program(name, program)
}

#[test]
fn test_sequential_statements() {
    let outcome = run_fixture("statements.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.statements(), vec![1, 1]);
}

#[test]
fn test_do_while() {
    let outcome = run_fixture("do-while.js");
    assert_eq!(outcome.statements(), vec![1, 1, 5]);
    assert_eq!(outcome.branches(), vec![4, 1]);
    assert_eq!(outcome.report.groups[0].kind, BranchKind::DoWhile);
}

#[test]
fn test_while() {
    let outcome = run_fixture("while.js");
    assert_eq!(outcome.branches(), vec![4, 1]);
    assert_eq!(outcome.report.groups[0].kind, BranchKind::While);
}

#[test]
fn test_functions() {
    let outcome = run_fixture("function.js");
    assert!(outcome.branches().is_empty());
    assert_eq!(outcome.functions(), vec![2, 0]);
    let names: Vec<_> = outcome.report.functions.iter().map(|f| f.name.as_deref()).collect();
    assert_eq!(names, vec![Some("foo"), Some("bar")]);
}

#[test]
fn test_arrow_function() {
    let outcome = run_fixture("arrow.js");
    assert_eq!(outcome.functions(), vec![1]);
    assert_eq!(outcome.report.functions[0].name.as_deref(), Some("f"));
}

#[test]
fn test_ternary() {
    assert_eq!(run_fixture("ternary.js").branches(), vec![0, 1]);
}

#[test]
fn test_try_catch() {
    let outcome = run_fixture("try-catch.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.branches(), vec![0, 1]);
}

#[test]
fn test_try_without_catch_propagates() {
    let outcome = run_fixture("try-no-catch.js");
    assert!(
        matches!(&outcome.result, Err(RuntimeError::Uncaught(message)) if message == "Error: boom")
    );
    assert_eq!(outcome.branches(), vec![0, 1]);
}

#[test]
fn test_if_else_if_chain() {
    let outcome = run_fixture("if-else-if.js");
    assert_eq!(outcome.branches(), vec![0, 0, 1, 0]);
    assert_eq!(outcome.report.groups.len(), 1);
    assert_eq!(outcome.report.groups[0].counts, vec![0, 0, 1, 0]);
}

#[test]
fn test_if_else() {
    let outcome = run_fixture("if-else.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.branches(), vec![0, 1]);
}

#[test]
fn test_logical_short_circuit() {
    let outcome = run_fixture("logic.js");
    assert_eq!(outcome.branches(), vec![1, 0, 1, 0, 0, 0]);
    assert_eq!(outcome.report.groups.len(), 3);
}

#[test]
fn test_switch_default() {
    assert_eq!(run_fixture("switch.js").branches(), vec![0, 0, 1]);
}

#[test]
fn test_switch_without_default() {
    let outcome = run_fixture("switch-no-default.js");
    assert_eq!(outcome.branches(), vec![0, 0, 1]);
    assert_eq!(outcome.metadata.groups[0].arms, 3);
}

#[test]
fn test_exported_class() {
    let outcome = run_fixture("class-export.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.report.statements.len(), 2);
    assert_eq!(outcome.report.functions.len(), 1);
    assert_eq!(outcome.report.functions[0].name.as_deref(), Some("bar"));
}

#[test]
fn test_if_else_end_to_end() {
    let source = "const a = true;\nfunction x() {}\nfunction y() {}\nif (a) { x(); } else { y(); }";
    let outcome = run_fixture_source(source);
    let groups: Vec<_> = outcome.report.branches.iter().map(|b| b.group_id).collect();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0], groups[1]);
    assert_eq!(outcome.branches(), vec![1, 0]);
    assert_eq!(outcome.functions(), vec![1, 0]);
}

fn run_fixture_source(source: &str) -> Outcome {
    run_program("inline.js", parse(source).expect("source does not parse"))
}

#[test]
fn test_marked_constructs_are_skipped() {
    for source in ["do {} while(true);", "try {} catch(e) {};", "switch(foo) {};"] {
        let mut program = parse(source).unwrap();
        let id = program.body[0].id();
        program.marks.mark(id);
        let before = program.clone();
        let metadata = Instrumenter::new("marked.js").instrument(&mut program).unwrap();
        assert!(metadata.is_empty(), "{source}");
        assert_eq!(program.body, before.body, "{source}");
    }
}

#[test]
fn test_node_without_location_fails() {
    let mut program = parse("a();").unwrap();
    program.body.insert(0, Stmt::expr(Expr::synthetic(ExprKind::Ident("b".into()))));
    let err = Instrumenter::new("bad.js").instrument(&mut program).unwrap_err();
    assert!(matches!(err, Error::InvalidNode { kind: EntryKind::Statement, .. }));
}

#[test]
fn test_second_pass_adds_nothing() {
    let mut program = parse(&fixture("program.js")).unwrap();
    let first = Instrumenter::new("program.js").instrument(&mut program).unwrap();
    let instrumented = program.clone();
    let second = Instrumenter::new("program.js").instrument(&mut program).unwrap();

    assert!(!first.is_empty());
    assert!(second.is_empty());
    assert_eq!(program, instrumented);
}

#[test]
fn test_behavior_is_preserved() {
    let source = fixture("program.js");

    let mut plain = Interpreter::new(Arc::new(CoverageStore::new()));
    plain.run(&parse(&source).unwrap()).unwrap();

    let outcome = run_fixture("program.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.output, plain.output());
    assert_eq!(outcome.output, ["TypeError", "negative zero odd even odd 5 five 3"]);

    let summary = outcome.report.summary();
    assert_eq!(summary.functions.covered, summary.functions.total);
    assert!(summary.branches.covered < summary.branches.total);
}

#[test]
fn test_thrown_error_identity_and_finally_order() {
    let source = "const err = new Error('x');\nlet same;\ntry {\n  try {\n    throw err;\n  } finally {\n    console.log('finally');\n  }\n} catch (e) {\n  console.log('outer');\n  same = e === err;\n}\nsame";
    let outcome = run_fixture_source(source);
    assert!(matches!(outcome.result, Ok(Value::Bool(true))));
    assert_eq!(outcome.output, ["finally", "outer"]);
    // inner try has no catch: [completed, threw]; outer: [completed, caught]
    assert_eq!(outcome.branches(), vec![0, 1, 0, 1]);
}

#[test]
fn test_printed_program_counts_like_the_tree() {
    let name = "program.js";
    let mut program = parse(&fixture(name)).unwrap();
    let metadata = Instrumenter::new(name).instrument(&mut program).unwrap();
    let printed = print(&program, &PrintOptions::default());

    let direct = run_fixture(name);

    let mut interpreter = Interpreter::new(Arc::new(CoverageStore::new()));
    interpreter.run(&parse(&printed).expect("printed program does not parse")).unwrap();
    assert_eq!(interpreter.output(), direct.output);

    let global = interpreter.global("globalThis").unwrap();
    let coverage = Object::lookup(global.as_object().unwrap(), "__coverage__").unwrap();
    let file = Object::lookup(coverage.as_object().unwrap(), name).unwrap();
    let file = file.as_object().unwrap();
    for entry in &metadata.entries {
        let key = entry.key.as_str();
        let count = Object::lookup(file, key).map_or(0, |count| count.to_number() as u64);
        assert_eq!(count, direct.raw.get(key), "{key}");
    }
}

fn group_counts(outcome: &Outcome) -> Vec<(BranchKind, Vec<u64>)> {
    outcome.report.groups.iter().map(|group| (group.kind, group.counts.clone())).collect()
}

#[test]
fn test_if_as_sole_consequent() {
    let outcome = run_fixture("nested-if.js");
    assert_eq!(
        group_counts(&outcome),
        vec![(BranchKind::If, vec![1, 0]), (BranchKind::If, vec![0, 1])]
    );
}

#[test]
fn test_if_as_loop_body() {
    let outcome = run_fixture("if-in-while.js");
    assert_eq!(
        group_counts(&outcome),
        vec![(BranchKind::While, vec![2, 1]), (BranchKind::If, vec![2, 0])]
    );
}

#[test]
fn test_constructs_in_else_position() {
    assert_eq!(
        group_counts(&run_fixture("else-while.js")),
        vec![(BranchKind::If, vec![0, 1]), (BranchKind::While, vec![3, 1])]
    );
    assert_eq!(
        group_counts(&run_fixture("else-switch.js")),
        vec![(BranchKind::If, vec![0, 1]), (BranchKind::Switch, vec![0, 1])]
    );

    let outcome = run_fixture("else-try.js");
    assert!(outcome.result.is_ok());
    assert_eq!(
        group_counts(&outcome),
        vec![(BranchKind::If, vec![0, 1]), (BranchKind::Try, vec![0, 1])]
    );
}

#[test]
fn test_try_left_by_return() {
    let outcome = run_fixture("try-return.js");
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.functions(), vec![2]);
    assert_eq!(group_counts(&outcome), vec![(BranchKind::Try, vec![2, 0])]);
}

#[test]
fn test_try_left_by_break_and_continue() {
    let outcome = run_fixture("try-break.js");
    assert!(outcome.result.is_ok());
    assert_eq!(
        group_counts(&outcome),
        vec![
            (BranchKind::While, vec![3, 0]),
            (BranchKind::Try, vec![3, 0]),
            (BranchKind::If, vec![1, 2]),
        ]
    );
}
