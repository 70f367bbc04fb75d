//! End-to-end scenarios through the public `compile_strings` API.

use anyhow::Result;
use inkwell::{context::Context, memory_buffer::MemoryBuffer};
use reso_lang::{compile_strings, CompileOptions, CompileResult};

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

fn assert_success(result: &CompileResult) {
    assert!(result.success, "unexpected diagnostics: {:?}", result.errors);
    assert!(result.ir.is_some());
}

#[test]
fn add_two_integers() {
    let result = compile_one("fn main() -> i32 { return 1 + 2; }");
    assert_success(&result);

    // the builder folds constant operands, so either form is acceptable
    let ir = result.ir.unwrap();
    assert!(
        ir.contains("ret i32 3") || ir.contains("add i32 1, 2"),
        "unexpected IR:\n{ir}"
    );
}

#[test]
fn addition_of_parameters_emits_add() {
    let result = compile_one("fn add(a: i32, b: i32) -> i32 { return a + b; }");
    assert_success(&result);

    let ir = result.ir.unwrap();
    assert!(ir.contains("add i32"), "unexpected IR:\n{ir}");
    assert!(ir.contains("define i32 @add"));
}

#[test]
fn type_mismatch_reports_and_suppresses_ir() {
    let result = compile_one("fn main() -> i32 { return 1.0; }");

    assert!(!result.success);
    assert!(result.ir.is_none(), "no IR may be emitted on error");
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);

    let record = &result.errors[0];
    assert_eq!(record.kind, reso_lang::diagnostics::ErrorKind::TypeMismatch);
    assert_eq!(record.line, 1);
}

#[test]
fn forward_reference_across_units() {
    let result = compile_strings(
        &[
            source("a.reso", "fn a() -> i32 { return b(); }"),
            source("b.reso", "fn b() -> i32 { return 42; }"),
        ],
        None,
        &CompileOptions::new(),
    )
    .expect("compilation job must not abort");

    assert_success(&result);
    let ir = result.ir.unwrap();
    assert!(ir.contains("define i32 @a"));
    assert!(ir.contains("define i32 @b"));
}

#[test]
fn mutual_recursion_across_units() {
    let result = compile_strings(
        &[
            source(
                "even.reso",
                "fn even(n: i32) -> bool { if n == 0 { return true; } return odd(n - 1); }",
            ),
            source(
                "odd.reso",
                "fn odd(n: i32) -> bool { if n == 0 { return false; } return even(n - 1); }",
            ),
        ],
        None,
        &CompileOptions::new(),
    )
    .expect("compilation job must not abort");

    assert_success(&result);
}

#[test]
fn duplicate_symbol_reported_once() {
    let result = compile_one("fn f() {} fn f() {}");

    assert!(!result.success);
    let duplicates: Vec<_> = result
        .errors
        .iter()
        .filter(|record| record.kind == reso_lang::diagnostics::ErrorKind::DuplicateSymbol)
        .collect();
    assert_eq!(duplicates.len(), 1, "{:?}", result.errors);
}

#[test]
fn resource_destruction_runs_in_reverse_order() {
    let result = compile_one(
        "resource A { x: i64 }\n\
         resource B { x: i64 }\n\
         fn main() {\n\
             let a = A { x: 1 };\n\
             let b = B { x: 2 };\n\
         }\n",
    );
    assert_success(&result);

    let ir = result.ir.unwrap();
    let b_drop = ir.find("call void @B.drop").expect("B must be destroyed");
    let a_drop = ir.find("call void @A.drop").expect("A must be destroyed");
    assert!(b_drop < a_drop, "b was declared last, it must die first:\n{ir}");
}

#[test]
fn early_return_also_destroys_in_reverse_order() {
    let result = compile_one(
        "resource A { x: i64 }\n\
         resource B { x: i64 }\n\
         fn f(c: bool) {\n\
             let a = A { x: 1 };\n\
             let b = B { x: 2 };\n\
             if c {\n\
                 return;\n\
             }\n\
         }\n",
    );
    assert_success(&result);

    // both the early return and the fall-through path run the destructors
    let ir = result.ir.unwrap();
    assert_eq!(ir.matches("call void @B.drop").count(), 2, "{ir}");
    assert_eq!(ir.matches("call void @A.drop").count(), 2, "{ir}");

    for (b_drop, _) in ir.match_indices("call void @B.drop") {
        let a_after = ir[b_drop..].find("call void @A.drop");
        assert!(a_after.is_some(), "every path destroys b before a:\n{ir}");
    }
}

#[test]
fn returned_resource_escapes_destruction() {
    let result = compile_one(
        "resource R { x: i64 }\n\
         fn make() -> R {\n\
             let r = R { x: 7 };\n\
             return r;\n\
         }\n",
    );
    assert_success(&result);

    let ir = result.ir.unwrap();
    let body_start = ir.find("define ptr @make").expect("make must be defined");
    let body_end = ir[body_start..].find("\n}").expect("make must be closed") + body_start;
    let body = &ir[body_start..body_end];
    assert!(
        !body.contains("call void @R.drop"),
        "the returned value must not be destroyed:\n{ir}"
    );
}

#[test]
fn optimization_level_out_of_bounds_is_rejected_up_front() {
    assert!(CompileOptions::new().with_optimization_level(4).is_err());
    assert!(CompileOptions::new().with_optimization_level(3).is_ok());
}

#[test]
fn optimized_build_succeeds() -> Result<()> {
    let mut options = CompileOptions::new();
    options.optimization_enabled = true;
    options = options.with_optimization_level(2)?;

    let result = compile_strings(
        &[source(
            "main.reso",
            "fn add(a: i64, b: i64) -> i64 { return a + b; }\n\
             fn main() -> i64 { return add(20, 22); }\n",
        )],
        None,
        &options,
    )?;

    assert_success(&result);
    Ok(())
}

#[test]
fn emitted_ir_reparses_into_an_identical_module() {
    let result = compile_one(
        "fn fib(n: i32) -> i32 {\n\
             if n < 2 { return n; }\n\
             return fib(n - 1) + fib(n - 2);\n\
         }\n",
    );
    assert_success(&result);
    let ir = result.ir.unwrap();

    let context = Context::create();
    let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), "reparsed");
    let module = context
        .create_module_from_ir(buffer)
        .expect("emitted IR must parse back");

    // the module identifier reflects the buffer name; everything else must
    // print identically
    let strip = |text: &str| {
        text.lines()
            .filter(|line| !line.starts_with("; ModuleID"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip(&module.print_to_string().to_string()), strip(&ir));
}

#[test]
fn object_file_is_written_on_success() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let object_path = dir.path().join("main.o");

    let result = compile_strings(
        &[source("main.reso", "fn main() -> i32 { return 0; }")],
        Some(&object_path),
        &CompileOptions::new(),
    )?;

    assert_success(&result);
    assert_eq!(result.output_path.as_deref(), Some(object_path.as_path()));
    assert!(object_path.exists());
    assert!(std::fs::metadata(&object_path)?.len() > 0);
    Ok(())
}

#[test]
fn no_object_file_on_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let object_path = dir.path().join("broken.o");

    let result = compile_strings(
        &[source("main.reso", "fn main() -> i32 { return missing(); }")],
        Some(&object_path),
        &CompileOptions::new(),
    )?;

    assert!(!result.success);
    assert!(result.output_path.is_none());
    assert!(!object_path.exists());
    Ok(())
}

#[test]
fn kitchen_sink_program_compiles() {
    let result = compile_one(
        "type size = i64;\n\
         resource Accumulator { total: size, count: size }\n\
         \n\
         fn accumulate(limit: i64) -> i64 {\n\
             let mut acc = Accumulator { total: 0, count: 0 };\n\
             for i in 0..limit {\n\
                 acc.total = acc.total + i;\n\
                 acc.count = acc.count + 1;\n\
             }\n\
             let mut spin = 0;\n\
             while spin < 3 && acc.total > 0 {\n\
                 spin = spin + 1;\n\
             }\n\
             return acc.total + spin as i64;\n\
         }\n\
         \n\
         fn ratio(a: i64, b: i64) -> f64 {\n\
             if b == 0 { return 0.0; }\n\
             return a as f64 / b as f64;\n\
         }\n\
         \n\
         fn main() -> i32 {\n\
             let total = accumulate(10);\n\
             let r = ratio(total, 10);\n\
             if r > 4.0 || total == 0 {\n\
                 return 1;\n\
             }\n\
             return 0;\n\
         }\n",
    );
    assert_success(&result);

    let ir = result.ir.unwrap();
    assert!(ir.contains("@Accumulator.new"));
    assert!(ir.contains("@Accumulator.drop"));
    assert!(ir.contains("fcmp ogt"));
}
