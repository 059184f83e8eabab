use thiserror::Error;

/// A half-open byte range over the original query text.
pub type SourceSpan = (usize, usize);

/// Raised by the lexer or the recursive-descent parser on malformed input.
///
/// The message templates here are pinned by tests (see spec.md §4.3 /
/// §9 "Parser state") and must be preserved verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at position {position_start}")]
pub struct ParseError {
    pub message: String,
    pub position_start: usize,
    pub position_end: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position_start: usize, position_end: usize) -> Self {
        ParseError {
            message: message.into(),
            position_start,
            position_end,
        }
    }

    pub fn at(message: impl Into<String>, position: usize) -> Self {
        ParseError::new(message, position, position)
    }
}

/// Raised by the validator: unknown functions, wrong arity, duplicate CTE
/// names, unresolved columns.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    #[error("Unknown function \"{name}\" at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("{function}(expression) function requires {expected} argument{plural}, got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
        plural: &'static str,
    },

    #[error("Duplicate CTE name \"{name}\"")]
    DuplicateCte { name: String },

    #[error("Unknown column \"{name}\"")]
    UnknownColumn { name: String },

    #[error("{0}")]
    Other(String),
}

impl SemanticError {
    pub fn arity(function: impl Into<String>, expected: usize, actual: usize) -> Self {
        SemanticError::Arity {
            function: function.into(),
            expected,
            actual,
            plural: if expected == 1 { "" } else { "s" },
        }
    }
}

/// Raised by the executor. Cast failures are NULL by default (spec.md §4.6)
/// and do not surface as `Runtime`; this variant is for function runtime
/// errors, source I/O errors, and the few caller-opt-in assertion failures
/// (see `EngineConfig::strict_casts`).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("{0}")]
    Message(String),

    #[error("data source error: {0}")]
    Source(String),
}

/// Top-level error produced by the executor's row stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("query cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn runtime(message: impl Into<String>) -> Self {
        ExecutorError::Runtime(RuntimeError::Message(message.into()))
    }

    pub fn source(message: impl Into<String>) -> Self {
        ExecutorError::Runtime(RuntimeError::Source(message.into()))
    }
}
