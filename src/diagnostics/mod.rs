//! Structured diagnostics for the compilation pipeline.
//!
//! Semantic analysis never aborts on the first problem: every stage pushes
//! [`ErrorRecord`]s into a shared [`ErrorSink`] and continues with a typed
//! placeholder, so one run surfaces as many findings as possible. Records
//! keep their insertion order, which within a unit matches source order.
//!
//! Rendering is deliberately not handled here; the sink stores structured
//! records and the CLI decides how to print them.

use std::{cell::RefCell, error::Error, fmt::Display, rc::Rc};

use crate::lexer::Span;

/// How bad a record is. The overall compilation fails iff any record of
/// severity [`Severity::Error`] or worse was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    /// A bug in the compiler itself (e.g. the backend rejected a request).
    Internal,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
            Severity::Internal => f.write_str("internal error"),
        }
    }
}

/// The taxonomy of things that can go wrong between lexing and emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    UnknownType,
    UndefinedSymbol,
    DuplicateSymbol,
    TypeMismatch,
    InvalidCoercion,
    ArityMismatch,
    MissingReturn,
    MutabilityViolation,
    UseAfterMove,
    InvalidLiteral,
    IrError,
    Disposed,
    IoError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::UnknownType => "unknown type",
            ErrorKind::UndefinedSymbol => "undefined symbol",
            ErrorKind::DuplicateSymbol => "duplicate symbol",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::InvalidCoercion => "invalid coercion",
            ErrorKind::ArityMismatch => "arity mismatch",
            ErrorKind::MissingReturn => "missing return",
            ErrorKind::MutabilityViolation => "mutability violation",
            ErrorKind::UseAfterMove => "use after move",
            ErrorKind::InvalidLiteral => "invalid literal",
            ErrorKind::IrError => "backend error",
            ErrorKind::Disposed => "builder used after release",
            ErrorKind::IoError => "io error",
        };
        f.write_str(name)
    }
}

/// One diagnostic, pinned to a file and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.column, self.severity, self.message
        ))
    }
}

impl Error for ErrorRecord {}

/// Shared, append-only collection of diagnostics.
///
/// Cheaply clonable handle; the parser, the environment and the code
/// generation walk all hold one and report into the same backing store.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    records: Rc<RefCell<Vec<ErrorRecord>>>,
}

impl ErrorSink {
    pub fn new() -> ErrorSink {
        Self::default()
    }

    pub fn report(&self, record: ErrorRecord) {
        self.records.borrow_mut().push(record);
    }

    /// Convenience for the common error-severity case.
    pub fn error(&self, kind: ErrorKind, message: impl ToString, file: impl ToString, span: Span) {
        self.report(ErrorRecord {
            severity: Severity::Error,
            kind,
            message: message.to_string(),
            file: file.to_string(),
            line: span.line,
            column: span.col,
        });
    }

    pub fn internal(&self, kind: ErrorKind, message: impl ToString, file: impl ToString) {
        self.report(ErrorRecord {
            severity: Severity::Internal,
            kind,
            message: message.to_string(),
            file: file.to_string(),
            line: 0,
            column: 0,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|record| record.severity >= Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let sink = ErrorSink::new();
        sink.error(
            ErrorKind::UndefinedSymbol,
            "first",
            "a.reso",
            Span { line: 1, col: 2 },
        );
        sink.error(
            ErrorKind::TypeMismatch,
            "second",
            "a.reso",
            Span { line: 3, col: 4 },
        );

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ErrorKind::UndefinedSymbol);
        assert_eq!(records[1].kind, ErrorKind::TypeMismatch);
        assert_eq!(records[1].line, 3);
    }

    #[test]
    fn test_shared_handle_sees_all_reports() {
        let sink = ErrorSink::new();
        let other = sink.clone();
        other.error(ErrorKind::SyntaxError, "oops", "b.reso", Span::default());

        assert!(sink.has_errors());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_warnings_do_not_fail_the_run() {
        let sink = ErrorSink::new();
        sink.report(ErrorRecord {
            severity: Severity::Warning,
            kind: ErrorKind::InvalidLiteral,
            message: "suspicious".into(),
            file: "c.reso".into(),
            line: 1,
            column: 1,
        });

        assert!(!sink.has_errors());
        assert!(!sink.is_empty());
    }
}
