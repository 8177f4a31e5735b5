//! Parse errors.
//!
//! Syntax errors are fatal: the loader converts the first parse error of a
//! source into a phase-0 diagnostic and stops loading.

use crate::foundation::Span;
use crate::lexer::Token;
use thiserror::Error;

/// A syntax error with its source location.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// Where it went wrong
    pub span: Span,
}

impl ParseError {
    /// Create a parse error from a message.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// "expected X, found Y" error.
    pub fn expected(expected: impl Into<String>, found: Option<Token>, span: Span) -> Self {
        let found = match found {
            Some(token) => format!("'{}'", token),
            None => "end of input".to_string(),
        };
        Self {
            message: format!("expected {}, found {}", expected.into(), found),
            span,
        }
    }
}
