//! Foundation types shared by every compiler stage.
//!
//! - [`span`] — compact source locations and the [`SourceMap`]
//! - [`name`] — dotted names, imp-names, min-class sets
//! - [`kind`] — the definition kind tags

pub mod kind;
pub mod name;
pub mod span;

pub use kind::{DefKind, KindSet};
pub use name::{DottedName, SortDir};
pub use span::{SourceFile, SourceMap, Span};
