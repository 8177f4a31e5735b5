//! Definition kind tags and kind sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a definition node.
///
/// Only `Fieldset` and `Field` participate in inheritance and
/// implementation trees; the other kinds exist for containment,
/// properties and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefKind {
    /// Top-level package
    Schema,
    /// Named set of fields and nested fieldsets
    Fieldset,
    /// Leaf attribute
    Field,
    /// Index definition inside a fieldset
    Index,
    /// Check constraint inside a fieldset
    Constraint,
    /// Property (name + ordered argument list)
    Property,
    /// `delete <name>;` — removes an inherited member
    Deletion,
}

impl DefKind {
    /// Human-readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            DefKind::Schema => "schema",
            DefKind::Fieldset => "fieldset",
            DefKind::Field => "field",
            DefKind::Index => "index",
            DefKind::Constraint => "constraint",
            DefKind::Property => "property",
            DefKind::Deletion => "deletion",
        }
    }

    fn bit(self) -> u8 {
        match self {
            DefKind::Schema => 1 << 0,
            DefKind::Fieldset => 1 << 1,
            DefKind::Field => 1 << 2,
            DefKind::Index => 1 << 3,
            DefKind::Constraint => 1 << 4,
            DefKind::Property => 1 << 5,
            DefKind::Deletion => 1 << 6,
        }
    }
}

impl fmt::Display for DefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small set of definition kinds.
///
/// Used as the `min_classes` restriction on dotted names: a binder
/// restricted to a kind set only accepts definitions whose kind is a
/// member. An empty set accepts nothing; see [`KindSet::any`] for the
/// unrestricted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KindSet(u8);

impl KindSet {
    /// The empty set.
    pub fn empty() -> Self {
        KindSet(0)
    }

    /// The set accepting every kind.
    pub fn any() -> Self {
        KindSet(0x7f)
    }

    /// A singleton set.
    pub fn only(kind: DefKind) -> Self {
        KindSet(kind.bit())
    }

    /// Add a kind, returning the extended set.
    pub fn with(self, kind: DefKind) -> Self {
        KindSet(self.0 | kind.bit())
    }

    /// Membership test.
    pub fn contains(self, kind: DefKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// True when no kind is accepted.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_set_membership() {
        let set = KindSet::only(DefKind::Field).with(DefKind::Fieldset);
        assert!(set.contains(DefKind::Field));
        assert!(set.contains(DefKind::Fieldset));
        assert!(!set.contains(DefKind::Index));
        assert!(KindSet::any().contains(DefKind::Property));
        assert!(KindSet::empty().is_empty());
    }
}
