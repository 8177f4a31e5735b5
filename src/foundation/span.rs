//! Source location tracking for error reporting.
//!
//! Sources are held in memory for the compiler's lifetime so that
//! diagnostics can quote source ranges.
//!
//! # Design
//!
//! - `Span` — compact source location (12 bytes)
//! - `SourceMap` — all loaded sources, with lookup operations
//! - `SourceFile` — a single source
//!
//! A source origin is either an absolute filesystem path or a URI, so it
//! is stored as a plain string rather than a `PathBuf`. Line and column
//! positions are not indexed up front: they are only needed when a
//! diagnostic is rendered, so [`SourceFile::line_col`] derives them by
//! scanning the prefix of the source on demand.

use serde::{Deserialize, Serialize};

/// Compact source location reference.
///
/// Points to a byte range in a loaded source with a cached line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap::files`
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
    /// Cached line number (1-based) for the start position
    pub start_line: u16,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32, start_line: u16) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
        }
    }

    /// Create a zero-length span at the start of a source.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0, 1)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one covering both.
    ///
    /// # Panics
    /// Panics if the spans come from different sources.
    pub fn merge(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different sources"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
        }
    }
}

/// Collection of all sources in a compilation.
///
/// Converts spans into human-readable locations and snippets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single loaded source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute file path or URI this source was loaded from
    pub origin: String,
    /// Original source text
    pub source: String,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a source and return its ID.
    pub fn add_source(&mut self, origin: String, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many sources");
        self.files.push(SourceFile::new(origin, source));
        file_id as u16
    }

    /// Get the source file for a span.
    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    /// Get the origin string for a span.
    pub fn origin(&self, span: &Span) -> &str {
        &self.files[span.file_id as usize].origin
    }

    /// Get the source snippet covered by a span.
    pub fn snippet(&self, span: &Span) -> &str {
        let file = &self.files[span.file_id as usize];
        &file.source[span.start as usize..span.end as usize]
    }

    /// Get the (line, column) position for a span's start, both 1-based.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.files[span.file_id as usize].line_col(span.start)
    }

    /// Number of sources in this map.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceFile {
    /// Create a new source file.
    pub fn new(origin: String, source: String) -> Self {
        Self { origin, source }
    }

    /// Get (line, column) for a byte offset, both 1-based.
    ///
    /// Scans the source prefix; positions are only requested when a
    /// diagnostic is rendered, so there is no precomputed index.
    ///
    /// # Panics
    /// Panics if the offset is beyond EOF.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        assert!(
            offset as usize <= self.source.len(),
            "offset {} is beyond EOF (len = {})",
            offset,
            self.source.len()
        );
        let prefix = &self.source[..offset as usize];
        let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
        let line_start = prefix.rfind('\n').map(|nl| nl + 1).unwrap_or(0);
        (line as u32, (offset as usize - line_start + 1) as u32)
    }

    /// Get the text of a specific line (1-based), without its line
    /// terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.lines().nth(line as usize - 1)
    }

    /// Number of lines in this source.
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(0, 10, 20, 1);
        assert!(!span.is_empty());
        assert!(Span::zero(3).is_empty());

        let merged = span.merge(&Span::new(0, 15, 30, 1));
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
    }

    #[test]
    #[should_panic(expected = "cannot merge spans from different sources")]
    fn merge_rejects_cross_file_spans() {
        let _ = Span::new(0, 0, 1, 1).merge(&Span::new(1, 0, 1, 1));
    }

    #[test]
    fn line_col_by_scanning() {
        let file = SourceFile::new(
            "test.yasdl".into(),
            "schema a {\n    field x;\n}\n".into(),
        );
        assert_eq!(file.line_col(0), (1, 1)); // 's'
        assert_eq!(file.line_col(7), (1, 8)); // 'a'
        assert_eq!(file.line_col(10), (1, 11)); // the newline itself
        assert_eq!(file.line_col(15), (2, 5)); // 'f'
        assert_eq!(file.line_col(24), (3, 1)); // '}'
    }

    #[test]
    fn line_text_and_count() {
        let file = SourceFile::new(
            "test.yasdl".into(),
            "schema a {\n    field x;\n}".into(),
        );
        assert_eq!(file.line_text(1), Some("schema a {"));
        assert_eq!(file.line_text(2), Some("    field x;"));
        assert_eq!(file.line_text(3), Some("}"));
        assert_eq!(file.line_text(4), None);
        assert_eq!(file.line_text(0), None);
        assert_eq!(file.line_count(), 3);

        // A trailing newline does not add a line.
        let file = SourceFile::new("t.yasdl".into(), "schema a { }\n".into());
        assert_eq!(file.line_count(), 1);
    }

    #[test]
    fn source_map_lookups() {
        let mut map = SourceMap::new();
        let id = map.add_source("a.yasdl".into(), "schema a {\n}\n".into());
        let span = Span::new(id, 0, 6, 1);
        assert_eq!(map.snippet(&span), "schema");
        assert_eq!(map.origin(&span), "a.yasdl");
        assert_eq!(map.line_col(&span), (1, 1));
        assert_eq!(map.file_count(), 1);
    }
}
