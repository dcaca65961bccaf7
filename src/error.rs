//! # Compiler Errors
//!
//! A single closed error type shared by every pass. There is no error
//! recovery anywhere in this compiler: the first violation any pass
//! encounters is returned immediately and aborts compilation.

/// A location in the source file, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Redeclaration,
    UndeclaredVar,
    Lvalue,
    LabelRedefinition,
    UndefinedLabel,
    UnboundControl,
    Switch,
    Internal,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    /// An internal invariant violation: a compiler bug, not a user error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            span: None,
        }
    }

    /// A semantic error raised after parsing, where the AST no longer
    /// carries source positions to blame.
    pub fn semantic(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.span) {
            (_, Some(span)) => write!(
                f,
                "{:?} error at line {}, column {}: {}",
                self.kind, span.line, span.col, self.message
            ),
            (ErrorKind::Internal, None) => write!(f, "internal error: {}", self.message),
            (kind, None) => write!(f, "{kind:?} error: {}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;
