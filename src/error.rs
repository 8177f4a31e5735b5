//! Diagnostics for the YASDL compiler.
//!
//! Every phase reports precisely located diagnostics through a shared
//! [`Diagnostics`] collector. A diagnostic is data, not a Rust error: a
//! phase step reports *all* of its violations, and the pipeline decides at
//! the step boundary whether to continue.
//!
//! # Design
//!
//! - `Diagnostic` — single message with primary and optional secondary spans
//! - `DiagKind` — categorizes diagnostics for filtering and statistics
//! - `Code` — stable numeric code encoding phase, step and check
//! - `Severity` — error, warning, or notice
//! - `Diagnostics` — append-only collector with severity bookkeeping
//! - `DiagnosticFormatter` — renders diagnostics with source snippets

use crate::foundation::{SourceMap, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric diagnostic code.
///
/// The decimal form encodes the origin of the diagnostic:
/// `phase * 1000 + step * 10 + check`. Code `3021` is phase 3, step 2,
/// check 1. Loader codes live in phase 0, internal invariant violations
/// in phase 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code(pub u16);

impl Code {
    /// Phase that produced this diagnostic.
    pub fn phase(self) -> u16 {
        self.0 / 1000
    }

    /// Step within the phase.
    pub fn step(self) -> u16 {
        (self.0 / 10) % 100
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y{:04}", self.0)
    }
}

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagKind {
    /// Invalid token or malformed construct
    Syntax,
    /// File or URI could not be loaded
    Io,
    /// Import statement could not be resolved
    BadImport,
    /// Package naming rule violated
    BadPackage,
    /// Name could not be bound to a definition
    UnresolvedName,
    /// Two definitions share a name within one block
    DuplicateName,
    /// Reserved word used as an identifier
    ReservedName,
    /// Conflicting or misplaced modifiers
    BadModifier,
    /// `implements` rule violated
    BadImplements,
    /// `ancestors` rule violated
    BadAncestor,
    /// Cycle in `implements` or `ancestors`
    Cycle,
    /// Static containment rule violated
    Containment,
    /// Malformed or misplaced property
    BadProperty,
    /// `references` rule violated
    BadReference,
    /// Index definition rule violated
    BadIndex,
    /// Constraint definition rule violated
    BadConstraint,
    /// Realization rule violated
    Realization,
    /// Required member is not realized
    RequirementUnmet,
    /// GUID missing or duplicated
    Guid,
    /// Driver-specific type rule violated
    TypeCheck,
    /// Compiler invariant violated (a bug, never user error)
    Internal,
}

impl DiagKind {
    /// Human-readable name used in rendered diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            DiagKind::Syntax => "syntax error",
            DiagKind::Io => "i/o error",
            DiagKind::BadImport => "bad import",
            DiagKind::BadPackage => "bad package name",
            DiagKind::UnresolvedName => "unresolved name",
            DiagKind::DuplicateName => "duplicate name",
            DiagKind::ReservedName => "reserved name",
            DiagKind::BadModifier => "bad modifier",
            DiagKind::BadImplements => "bad implements",
            DiagKind::BadAncestor => "bad ancestor",
            DiagKind::Cycle => "cyclic reference",
            DiagKind::Containment => "containment violation",
            DiagKind::BadProperty => "bad property",
            DiagKind::BadReference => "bad reference",
            DiagKind::BadIndex => "bad index",
            DiagKind::BadConstraint => "bad constraint",
            DiagKind::Realization => "realization error",
            DiagKind::RequirementUnmet => "requirement not realized",
            DiagKind::Guid => "guid error",
            DiagKind::TypeCheck => "type error",
            DiagKind::Internal => "internal compiler error",
        }
    }
}

/// Diagnostic severity level.
///
/// Errors stop the pipeline at the end of the current phase step.
/// Warnings and notices are reported and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Reported and discarded; purely informational
    Notice,
    /// Code is valid but suspicious
    Warning,
    /// Compilation cannot proceed past the current step
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Notice => write!(f, "notice"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Secondary labeled span in a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Related source location
    pub span: Span,
    /// Label text, e.g. "first defined here"
    pub message: String,
}

/// A single compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Category of this diagnostic
    pub kind: DiagKind,
    /// Severity level
    pub severity: Severity,
    /// Stable numeric code (encodes phase and step)
    pub code: Code,
    /// Primary source location
    pub span: Span,
    /// Human-readable message
    pub message: String,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(kind: DiagKind, code: Code, span: Span, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Error, code, span, message.into())
    }

    /// Create a warning diagnostic.
    pub fn warning(kind: DiagKind, code: Code, span: Span, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Warning, code, span, message.into())
    }

    /// Create a notice diagnostic.
    pub fn notice(kind: DiagKind, code: Code, span: Span, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Notice, code, span, message.into())
    }

    fn with_severity(
        kind: DiagKind,
        severity: Severity,
        code: Code,
        span: Span,
        message: String,
    ) -> Self {
        Self {
            kind,
            severity,
            code,
            span,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Add a secondary labeled span (chaining).
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    /// Add a note or hint (chaining).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}: {}",
            self.severity,
            self.code,
            self.kind.name(),
            self.message
        )
    }
}

/// Append-only diagnostic collector.
///
/// Phases push diagnostics here and query [`Diagnostics::has_error`] at
/// step boundaries. The collected list is never retracted.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
    notices: usize,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Notice => self.notices += 1,
        }
        self.items.push(diag);
    }

    /// Record several diagnostics.
    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.push(diag);
        }
    }

    /// True when at least one error has been recorded.
    pub fn has_error(&self) -> bool {
        self.errors > 0
    }

    /// True when at least one warning has been recorded.
    pub fn has_warning(&self) -> bool {
        self.warnings > 0
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// All recorded diagnostics, in report order.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Consume the collector, returning the recorded diagnostics.
    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Formats diagnostics with source code context.
///
/// Produces messages with the origin and line/column location, the source
/// line, a caret underline, secondary labels and notes.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// Create a formatter over the given sources.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Format a single diagnostic.
    pub fn format(&self, diag: &Diagnostic) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{}[{}]: {}: {}\n",
            diag.severity,
            diag.code,
            diag.kind.name(),
            diag.message
        ));

        let (line, col) = self.sources.line_col(&diag.span);
        output.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.sources.origin(&diag.span),
            line,
            col
        ));

        if let Some(text) = self.sources.file(&diag.span).line_text(line) {
            output.push_str(&format!("{:4} | {}\n", line, text));
            // Pad with the line's own tabs so the carets line up in a
            // terminal regardless of tab width.
            let pad: String = text
                .chars()
                .take(col as usize - 1)
                .map(|ch| if ch == '\t' { '\t' } else { ' ' })
                .collect();
            // The caret run covers the snippet, or what fits of it on its
            // first line.
            let carets = self
                .sources
                .snippet(&diag.span)
                .lines()
                .next()
                .map_or(0, |first| first.chars().count())
                .max(1);
            output.push_str(&format!("{:4} | {}{}\n", "", pad, "^".repeat(carets)));
        }

        for label in &diag.labels {
            let (label_line, label_col) = self.sources.line_col(&label.span);
            output.push_str(&format!(
                "   = note: {} (at {}:{}:{})\n",
                label.message,
                self.sources.origin(&label.span),
                label_line,
                label_col
            ));
        }
        for note in &diag.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }
        output
    }

    /// Format several diagnostics, separated by blank lines.
    pub fn format_all(&self, diags: &[Diagnostic]) -> String {
        diags
            .iter()
            .map(|d| self.format(d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
