//! Crate-wide error type with stable machine-readable codes.
//!
//! Errors bubble up through the public compile and planning entry points
//! so callers can distinguish syntax errors (which carry a character
//! position) from shape errors raised by the planner.

use std::fmt;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured errors emitted by the expression compiler and the query
/// planner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The tokenizer or parser hit a lexeme it cannot accept.
    #[error("unexpected token `{token}` at position {position}")]
    UnexpectedToken {
        /// Offending lexeme, or `EOF` when input ended early.
        token: String,
        /// 0-based character offset of the end of the offending token.
        position: usize,
    },
    /// An expression has a shape the current operation cannot accept
    /// (non-predicate where-term, `*` inside WHERE, disallowed construct
    /// in an index expression).
    #[error("expression `{expression}` is not valid here: {reason}")]
    InvalidExpressionType {
        /// Normalized source of the offending expression.
        expression: String,
        /// What the caller required.
        reason: &'static str,
    },
    /// Index names must be plain identifiers of bounded length.
    #[error("invalid index name '{0}'")]
    InvalidIndexName(String),
    /// Document transforms may not target `$`-prefixed fields.
    #[error("field '{0}' is not a valid update target")]
    InvalidUpdateField(String),
    /// A value cannot be represented or converted as requested.
    #[error("invalid data type: {0}")]
    InvalidDataType(String),
    /// Document keys and index string keys reject the `\0` character.
    #[error("null character is not allowed in string key '{0}'")]
    InvalidNullCharInString(String),
    /// Catch-all for invalid planner input combinations.
    #[error("invalid query: {0}")]
    InvalidQuery(&'static str),
}

impl Error {
    /// Returns the stable machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnexpectedToken { .. } => "UnexpectedToken",
            Error::InvalidExpressionType { .. } => "InvalidExpressionType",
            Error::InvalidIndexName(_) => "InvalidIndexName",
            Error::InvalidUpdateField(_) => "InvalidUpdateField",
            Error::InvalidDataType(_) => "InvalidDataType",
            Error::InvalidNullCharInString(_) => "InvalidNullCharInString",
            Error::InvalidQuery(_) => "InvalidQuery",
        }
    }

    /// Character position attached to the error, when one exists.
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::UnexpectedToken { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Formats an error with its code prefix, mirroring how the engine
/// surfaces failures to clients.
pub struct ErrorWithCode<'a>(pub &'a Error);

impl fmt::Display for ErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
