//! Compiler for the Reso programming language.
//!
//! Reso is a small statically-typed language that lowers to LLVM IR. The
//! pipeline: source text is lexed and parsed per compilation unit, then a
//! single code generation walk registers types and signatures across all
//! units before lowering any body, so forward references and mutual
//! recursion work between files. Semantic errors accumulate in a sink and
//! lowering continues with typed placeholders; a run either yields the
//! finished module (textual IR, optionally an object file) or the full
//! list of diagnostics.
//!
//! The entry points are [`compile`] for files on disk and
//! [`compile_strings`] for in-memory sources.

pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod types;

use std::{
    error::Error,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use inkwell::context::Context;
use log::{debug, info};

use codegen::{
    builder::{IrBuilder, IrError, OutputFileType},
    CodegenContext, CompilationUnit,
};
use diagnostics::{ErrorKind, ErrorRecord, ErrorSink};
use lexer::Lexer;
use parser::{ast::Item, Parser};

/// Tunables for one compilation job. `optimization_level` is validated by
/// its setter so a bad level is rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub optimization_enabled: bool,
    optimization_level: u8,
    pub debug_info_enabled: bool,
    pub verbose_output: bool,
    pub print_ir: bool,
    /// Per-unit ceiling on reported errors before that unit stops lowering.
    pub error_limit: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            optimization_enabled: false,
            optimization_level: 2,
            debug_info_enabled: false,
            verbose_output: false,
            print_ir: false,
            error_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOptions {
    pub message: String,
}

impl Display for InvalidOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for InvalidOptions {}

impl CompileOptions {
    pub fn new() -> CompileOptions {
        Self::default()
    }

    pub fn optimization_level(&self) -> u8 {
        self.optimization_level
    }

    pub fn with_optimization_level(mut self, level: u8) -> Result<CompileOptions, InvalidOptions> {
        if level > 3 {
            return Err(InvalidOptions {
                message: format!("optimization level must be 0..=3, got {level}"),
            });
        }
        self.optimization_level = level;
        Ok(self)
    }
}

/// Outcome of one compilation job. `ir` is present only on success; no
/// partial IR or object file survives a failed run.
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
    pub success: bool,
    pub errors: Vec<ErrorRecord>,
    pub ir: Option<String>,
    pub output_path: Option<PathBuf>,
}

/// Failures that abort the whole job rather than being recorded and
/// recovered from.
#[derive(Debug)]
pub enum CompileError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The IR builder was used after release.
    Disposed,
    /// The backend rejected a request; a compiler bug.
    Internal(String),
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Io { path, source } => {
                f.write_fmt(format_args!("cannot read '{}': {source}", path.display()))
            }
            CompileError::Disposed => f.write_str("IR builder used after release"),
            CompileError::Internal(message) => {
                f.write_fmt(format_args!("internal compiler error: {message}"))
            }
        }
    }
}

impl Error for CompileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CompileError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn internal(error: IrError) -> CompileError {
    match error {
        IrError::Disposed => CompileError::Disposed,
        other => CompileError::Internal(other.to_string()),
    }
}

/// Compile source files from disk, optionally writing an object file.
pub fn compile(
    files: &[PathBuf],
    output: Option<&Path>,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        sources.push((path.display().to_string(), content));
    }
    compile_strings(&sources, output, options)
}

/// Compile in-memory sources, each a `(name, content)` pair. All units
/// share one type registry, one global scope and one LLVM module.
pub fn compile_strings(
    sources: &[(String, String)],
    output: Option<&Path>,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    debug!("compiling {} unit(s)", sources.len());

    let sink = ErrorSink::new();
    let mut units = vec![];
    for (file, content) in sources {
        if let Some(items) = parse_source(file, content, &sink) {
            units.push(CompilationUnit {
                file: file.clone(),
                items,
            });
        }
    }

    let context = Context::create();
    let module_name = sources
        .first()
        .map(|(name, _)| name.as_str())
        .unwrap_or("reso");
    let ir = IrBuilder::new(&context, module_name);
    let ctx = CodegenContext::new(ir, sink.clone(), options.error_limit);

    if options.debug_info_enabled {
        ctx.ir.stamp_debug_info().map_err(internal)?;
    }

    match codegen::run(&ctx, &units) {
        Ok(()) => {}
        Err(IrError::Disposed) => return Err(CompileError::Disposed),
        Err(error) => return Err(CompileError::Internal(error.to_string())),
    }

    let success = !sink.has_errors();
    let mut textual_ir = None;
    let mut output_path = None;

    if success {
        ctx.ir.verify().map_err(internal)?;
        if options.optimization_enabled {
            debug!("running pass pipeline default<O{}>", options.optimization_level);
            ctx.ir.optimize(options.optimization_level).map_err(internal)?;
        }
        textual_ir = Some(ctx.ir.emit_ir().map_err(internal)?);

        if let Some(path) = output {
            info!("writing object file to '{}'", path.display());
            ctx.ir
                .emit_object(path, OutputFileType::Object, options.optimization_level)
                .map_err(internal)?;
            output_path = Some(path.to_path_buf());
        }
    } else {
        debug!("{} diagnostic(s), skipping emission", sink.len());
    }

    // mark the native handles released; the handles themselves go away
    // when `ctx` drops at the end of this scope
    ctx.ir.dispose().map_err(internal)?;

    Ok(CompileResult {
        success,
        errors: sink.records(),
        ir: textual_ir,
        output_path,
    })
}

/// Lex and parse one unit. A failure abandons this unit's tree (recorded in
/// the sink) and lets the remaining units continue.
fn parse_source(file: &str, content: &str, sink: &ErrorSink) -> Option<Vec<Item>> {
    let tokens = match Lexer::new(content).lex() {
        Ok(tokens) => tokens,
        Err(error) => {
            let kind = if error.invalid_literal {
                ErrorKind::InvalidLiteral
            } else {
                ErrorKind::SyntaxError
            };
            sink.error(kind, error.message, file, error.span);
            return None;
        }
    };

    match Parser::new(tokens).parse_unit() {
        Ok(items) => Some(items),
        Err(error) => {
            sink.error(ErrorKind::SyntaxError, error.message, file, error.span);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_level_bounds() {
        assert!(CompileOptions::new().with_optimization_level(0).is_ok());
        assert!(CompileOptions::new().with_optimization_level(3).is_ok());
        assert!(CompileOptions::new().with_optimization_level(4).is_err());
        assert_eq!(CompileOptions::new().optimization_level(), 2);
    }

    #[test]
    fn test_parse_source_records_syntax_errors() {
        let sink = ErrorSink::new();
        assert!(parse_source("bad.reso", "fn {", &sink).is_none());
        assert!(sink.has_errors());
        assert_eq!(sink.records()[0].kind, ErrorKind::SyntaxError);
    }
}
