//! Diagnostic behavior: recovery, ordering, the error ceiling, and the
//! individual error kinds the front end can produce.

use reso_lang::{
    compile_strings,
    diagnostics::{ErrorKind, ErrorRecord},
    CompileOptions, CompileResult,
};

fn source(name: &str, content: &str) -> (String, String) {
    (name.to_string(), content.to_string())
}

fn compile_one(content: &str) -> CompileResult {
    compile_strings(
        &[source("main.reso", content)],
        None,
        &CompileOptions::new(),
    )
    .expect("compilation job must not abort")
}

fn kinds(result: &CompileResult) -> Vec<ErrorKind> {
    result.errors.iter().map(|record| record.kind).collect()
}

#[test]
fn undefined_symbol() {
    let result = compile_one("fn main() -> i32 { return x; }");
    assert!(kinds(&result).contains(&ErrorKind::UndefinedSymbol));
}

#[test]
fn undefined_type_in_signature() {
    let result = compile_one("fn f(x: widget) {}");
    assert!(kinds(&result).contains(&ErrorKind::UnknownType));
}

#[test]
fn arity_mismatch() {
    let result = compile_one(
        "fn add(a: i32, b: i32) -> i32 { return a + b; }\n\
         fn main() -> i32 { return add(1); }\n",
    );
    assert!(kinds(&result).contains(&ErrorKind::ArityMismatch));
}

#[test]
fn assignment_to_immutable_binding() {
    let result = compile_one("fn main() { let x = 1; x = 2; }");
    assert!(kinds(&result).contains(&ErrorKind::MutabilityViolation));
}

#[test]
fn mutable_binding_can_be_reassigned() {
    let result = compile_one("fn main() { let mut x = 1; x = 2; }");
    assert!(result.success, "{:?}", result.errors);
}

#[test]
fn missing_return_on_fallthrough() {
    let result = compile_one("fn f() -> i32 { let x = 1; }");
    assert!(kinds(&result).contains(&ErrorKind::MissingReturn));
}

#[test]
fn no_missing_return_when_both_branches_return() {
    let result = compile_one(
        "fn sign(n: i32) -> i32 {\n\
             if n < 0 { return -1; } else { return 1; }\n\
         }\n",
    );
    assert!(result.success, "{:?}", result.errors);
}

#[test]
fn missing_return_when_one_branch_falls_through() {
    let result = compile_one(
        "fn f(c: bool) -> i32 {\n\
             if c { return 1; }\n\
         }\n",
    );
    assert!(kinds(&result).contains(&ErrorKind::MissingReturn));
}

#[test]
fn use_after_move_of_resource() {
    let result = compile_one(
        "resource R { x: i64 }\n\
         fn main() -> i64 {\n\
             let a = R { x: 1 };\n\
             let b = a;\n\
             return a.x;\n\
         }\n",
    );
    assert!(kinds(&result).contains(&ErrorKind::UseAfterMove));
}

#[test]
fn moved_resource_is_destroyed_once() {
    let result = compile_one(
        "resource R { x: i64 }\n\
         fn main() {\n\
             let a = R { x: 1 };\n\
             let b = a;\n\
         }\n",
    );
    assert!(result.success, "{:?}", result.errors);
    let ir = result.ir.unwrap();
    assert_eq!(ir.matches("call void @R.drop").count(), 1, "{ir}");
}

#[test]
fn null_coerces_to_resources_but_not_scalars() {
    let ok = compile_one(
        "resource R { x: i64 }\n\
         fn main() { let r: R = null; }\n",
    );
    assert!(ok.success, "{:?}", ok.errors);

    let bad = compile_one("fn main() { let x: i32 = null; }");
    assert!(kinds(&bad).contains(&ErrorKind::TypeMismatch));
}

#[test]
fn invalid_cast_between_non_scalars() {
    let result = compile_one(
        "resource R { x: i64 }\n\
         fn f(r: R) -> i64 { return r as i64; }\n",
    );
    assert!(kinds(&result).contains(&ErrorKind::InvalidCoercion));
}

#[test]
fn signedness_is_never_crossed_implicitly() {
    let result = compile_one("fn f(a: i32, b: u32) -> i32 { return a + b; }");
    assert!(kinds(&result).contains(&ErrorKind::TypeMismatch));
}

#[test]
fn shadowing_in_nested_block_is_allowed() {
    let result = compile_one(
        "fn main() -> i32 {\n\
             let x = 1;\n\
             {\n\
                 let x = 2;\n\
             }\n\
             return x;\n\
         }\n",
    );
    assert!(result.success, "{:?}", result.errors);
}

#[test]
fn redeclaration_in_same_scope_is_rejected() {
    let result = compile_one("fn main() { let x = 1; let x = 2; }");
    assert!(kinds(&result).contains(&ErrorKind::DuplicateSymbol));
}

#[test]
fn statements_after_return_are_still_checked() {
    let result = compile_one(
        "fn f() -> i32 {\n\
             return 1;\n\
             return true;\n\
         }\n",
    );
    assert!(kinds(&result).contains(&ErrorKind::TypeMismatch));
}

#[test]
fn errors_surface_in_source_order() {
    let result = compile_one(
        "fn main() {\n\
             let a = one;\n\
             let b = two;\n\
             let c = three;\n\
         }\n",
    );

    let lines: Vec<usize> = result.errors.iter().map(|record| record.line).collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted, "{:?}", result.errors);
    assert_eq!(result.errors.len(), 3);
}

#[test]
fn error_ceiling_stops_a_unit() {
    let mut body = String::from("fn main() {\n");
    for index in 0..30 {
        body.push_str(&format!("    let x{index} = missing{index};\n"));
    }
    body.push_str("}\n");

    let mut options = CompileOptions::new();
    options.error_limit = 3;
    let result = compile_strings(&[source("main.reso", &body)], None, &options)
        .expect("compilation job must not abort");

    assert!(!result.success);
    assert!(
        result.errors.len() < 30,
        "lowering must stop at the ceiling, got {} records",
        result.errors.len()
    );
}

#[test]
fn error_in_one_unit_does_not_stop_another() {
    let result = compile_strings(
        &[
            source("bad.reso", "fn bad() -> i32 { return nope; }"),
            source("good.reso", "fn good() -> i32 { return also_missing; }"),
        ],
        None,
        &CompileOptions::new(),
    )
    .expect("compilation job must not abort");

    let files: Vec<&str> = result
        .errors
        .iter()
        .map(|record| record.file.as_str())
        .collect();
    assert!(files.contains(&"bad.reso"));
    assert!(files.contains(&"good.reso"));
}

#[test]
fn syntax_error_abandons_only_its_unit() {
    let result = compile_strings(
        &[
            source("broken.reso", "fn ("),
            source("fine.reso", "fn fine() -> i32 { return 1; }"),
        ],
        None,
        &CompileOptions::new(),
    )
    .expect("compilation job must not abort");

    assert!(!result.success);
    assert!(kinds(&result).contains(&ErrorKind::SyntaxError));
    // the healthy unit still made it through registration and lowering
    let fine_errors: Vec<&ErrorRecord> = result
        .errors
        .iter()
        .filter(|record| record.file == "fine.reso")
        .collect();
    assert!(fine_errors.is_empty(), "{:?}", result.errors);
}
