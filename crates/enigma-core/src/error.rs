//! Error types for parsing, evaluation and execution.
//!
//! Parse failures carry the offending source line; runtime failures carry an
//! [`ErrorKind`] and the line of the action that failed. Nothing here is
//! recoverable: every error ends the current parse or execution request.

use std::fmt;

use thiserror::Error;

/// A malformed expression, reported relative to the text being parsed.
///
/// The expression parser has no notion of source lines; the tokenizer turns
/// this into a [`ParseError`] once it knows which line it was working on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (column {column})")]
pub struct SyntaxError {
    /// What went wrong.
    pub message: String,
    /// Zero-based character offset into the parsed text.
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, column: usize) -> Self {
        Self {
            message: message.into(),
            column,
        }
    }
}

/// A lexical, grammatical or structural violation in a rule file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at line {line}: {message}")]
pub struct ParseError {
    /// Human-readable description.
    pub message: String,
    /// One-based source line number.
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    /// Wraps an expression syntax error with the line it occurred on.
    pub fn syntax(err: SyntaxError, line: usize) -> Self {
        Self::new(err.to_string(), line)
    }
}

/// Errors from loading a rule file from disk.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// An operand or argument had the wrong dynamic type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A variable had no binding in the evaluation environment.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Division by zero, overflow, or a negative square root.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

/// Errors reported by a [`World`](crate::world::World) collaborator.
#[derive(Error, Debug)]
pub enum WorldError {
    /// A named area, position or entity does not exist.
    #[error("unknown {kind} '{name}'")]
    Unresolved {
        /// What was being looked up ("area", "position", ...).
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// The value cannot designate the requested kind of reference.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Persisting state failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding persisted state failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TypeMismatch,
    UnresolvedReference,
    CollaboratorFailure,
    Arithmetic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::UnresolvedReference => "unresolved reference",
            ErrorKind::CollaboratorFailure => "collaborator failure",
            ErrorKind::Arithmetic => "arithmetic error",
        };
        f.write_str(name)
    }
}

/// A failure while executing an action.
///
/// Effects already applied to the collaborator before the failure are kept;
/// execution is not transactional.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Runtime error at line {line}: {kind}: {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    /// Line of the failing action, or 0 when raised outside an action.
    pub line: usize,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: 0,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    /// Attaches a line number unless one is already set.
    ///
    /// Errors bubble up through nested scopes; the innermost action wins.
    pub fn at_line(mut self, line: usize) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }
}

impl From<EvalError> for ExecutionError {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::TypeMismatch(msg) => Self::new(ErrorKind::TypeMismatch, msg),
            EvalError::UnresolvedReference(msg) => Self::new(ErrorKind::UnresolvedReference, msg),
            EvalError::Arithmetic(msg) => Self::new(ErrorKind::Arithmetic, msg),
        }
    }
}

impl From<WorldError> for ExecutionError {
    fn from(e: WorldError) -> Self {
        let kind = match e {
            WorldError::Unresolved { .. } => ErrorKind::UnresolvedReference,
            _ => ErrorKind::CollaboratorFailure,
        };
        Self::new(kind, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Unknown token 'frob'", 3);
        assert_eq!(err.to_string(), "Parse error at line 3: Unknown token 'frob'");
    }

    #[test]
    fn test_syntax_error_keeps_column() {
        let err = ParseError::syntax(SyntaxError::new("Unterminated string", 7), 2);
        assert_eq!(err.line, 2);
        assert!(err.message.contains("column 7"));
    }

    #[test]
    fn test_eval_error_maps_to_kind() {
        let err: ExecutionError = EvalError::UnresolvedReference("player".into()).into();
        assert_eq!(err.kind, ErrorKind::UnresolvedReference);
        let err: ExecutionError = EvalError::TypeMismatch("x".into()).into();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_world_error_maps_to_kind() {
        let err: ExecutionError = WorldError::Unresolved { kind: "area", name: "vault".into() }.into();
        assert_eq!(err.kind, ErrorKind::UnresolvedReference);
        assert!(err.message.contains("vault"));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: ExecutionError = WorldError::Io(io).into();
        assert_eq!(err.kind, ErrorKind::CollaboratorFailure);
    }

    #[test]
    fn test_at_line_keeps_innermost() {
        let err = ExecutionError::type_mismatch("bad").at_line(5).at_line(2);
        assert_eq!(err.line, 5);
        assert_eq!(err.to_string(), "Runtime error at line 5: type mismatch: bad");
    }
}
