//! Dotted names as they appear in YASDL source.
//!
//! A dotted name is a sequence of simple names, optionally prefixed with
//! the `schema` keyword (absolute name) or `=` (imp-name, "the final
//! implementor of"), and optionally suffixed with a bracketed min-class
//! set that restricts what the name may bind to.
//!
//! Names are case-insensitive; the lexer lowercases them, so segments here
//! are already canonical. The verbatim source spelling survives only in
//! the source map, which diagnostics quote directly.

use crate::foundation::kind::KindSet;
use crate::foundation::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction of an index field argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDir {
    /// Ascending (`+`, the default)
    #[default]
    Asc,
    /// Descending (`-`)
    Desc,
}

/// A dotted name occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DottedName {
    /// Lowercased segments, in order; never empty
    pub segments: Vec<String>,
    /// `=` prefix: bind statically, then take the final implementor
    pub imp: bool,
    /// `schema.` prefix: resolve from the enclosing schema, no acquisition
    pub absolute: bool,
    /// Bracketed kind restriction, `None` when the binding context decides
    pub min_classes: Option<KindSet>,
    /// Location of the whole name
    pub span: Span,
}

impl DottedName {
    /// Create a name from pre-lowercased segments.
    pub fn new(segments: Vec<String>, span: Span) -> Self {
        debug_assert!(!segments.is_empty(), "dotted name must have segments");
        Self {
            segments,
            imp: false,
            absolute: false,
            min_classes: None,
            span,
        }
    }

    /// First segment.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment.
    pub fn last(&self) -> &str {
        self.segments.last().expect("dotted name must have segments")
    }

    /// True for single-segment names.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    /// Dot-joined form, without prefixes.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// The name with the given leading segments removed.
    ///
    /// Returns `None` unless `prefix` is a proper segment-wise prefix.
    pub fn strip_prefix(&self, prefix: &str) -> Option<Vec<String>> {
        let prefix: Vec<&str> = prefix.split('.').collect();
        if self.segments.len() <= prefix.len() {
            return None;
        }
        if self
            .segments
            .iter()
            .zip(&prefix)
            .all(|(seg, pre)| seg == pre)
        {
            Some(self.segments[prefix.len()..].to_vec())
        } else {
            None
        }
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.imp {
            f.write_str("=")?;
        }
        if self.absolute {
            f.write_str("schema.")?;
        }
        f.write_str(&self.segments.join("."))
    }
}
