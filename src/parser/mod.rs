//! Hand-written recursive descent parser for YASDL.
//!
//! Produces definitions directly into the shared [`Arena`]; the returned
//! [`ParsedSchema`] carries the schema root, its package name and its
//! import table. Syntax errors abort the parse of the source.
//!
//! ## Architecture
//!
//! - `stream` — [`TokenStream`] wrapper with lookahead
//! - `error` — [`ParseError`]
//! - `decl` — keyword-dispatched declaration parsers
//!
//! The grammar is small enough that expressions do not exist: property
//! arguments are literals, symbols and dotted names.

mod decl;
mod error;
mod stream;

pub use error::ParseError;

use crate::ast::{Arena, DefId, Import};
use crate::foundation::Span;
use crate::lexer::Token;
use std::ops::Range;
use stream::TokenStream;

/// Result of parsing one schema source.
#[derive(Debug)]
pub struct ParsedSchema {
    /// The schema definition; its subtree is fully attached
    pub root: DefId,
    /// Declared package name (dot-separated, lowercased)
    pub package: String,
    /// Location of the package name
    pub package_span: Span,
    /// The `use`/`require` statements, in source order
    pub imports: Vec<Import>,
}

/// Parse one schema source into the arena.
///
/// # Parameters
/// - `tokens`: token/byte-range pairs from [`crate::lexer::tokenize`]
/// - `file_id`: id of the source in the compilation's source map
/// - `arena`: the shared definition arena
///
/// # Errors
/// Returns the first syntax error; the arena may contain partially
/// attached definitions from the failed parse, which the caller discards
/// by treating syntax errors as fatal.
pub fn parse_schema(
    tokens: &[(Token, Range<usize>)],
    file_id: u16,
    arena: &mut Arena,
) -> Result<ParsedSchema, ParseError> {
    let mut stream = TokenStream::new(tokens, file_id);
    let parsed = decl::SchemaParser::new(&mut stream, arena).parse_schema()?;
    if !stream.at_end() {
        return Err(ParseError::new(
            "trailing input after schema definition",
            stream.current_span(),
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests;
