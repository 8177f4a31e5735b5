//! The YASDL definition graph.
//!
//! All definitions of a compilation live in a single flat [`Arena`];
//! every relation between definitions (ownership, implementation,
//! inheritance, membership) is an edge expressed as a stable [`DefId`].
//! Nothing owns a pointer to another definition, so the back-references
//! the later phases add (`direct_implementor`, `ancestors`, `members`)
//! cannot create ownership cycles.
//!
//! Each phase writes its results onto [`Definition`] fields and never
//! mutates them again: the arena is annotated append-only, phase by phase.

mod walk;

pub use walk::ContainedPaths;

use crate::foundation::{DefKind, DottedName, KindSet, SortDir, Span};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a definition in the [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefId(pub u32);

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Modifier set of a definition.
///
/// `abstract` and `final` are mutually exclusive; phase 1 enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers(u8);

impl Modifiers {
    const ABSTRACT: u8 = 1 << 0;
    const FINAL: u8 = 1 << 1;
    const REQUIRED: u8 = 1 << 2;

    /// The empty modifier set.
    pub fn empty() -> Self {
        Modifiers(0)
    }

    /// Mark as `abstract`.
    pub fn set_abstract(&mut self) {
        self.0 |= Self::ABSTRACT;
    }

    /// Mark as `final`.
    pub fn set_final(&mut self) {
        self.0 |= Self::FINAL;
    }

    /// Mark as `required`.
    pub fn set_required(&mut self) {
        self.0 |= Self::REQUIRED;
    }

    /// True when `abstract` is set.
    pub fn is_abstract(self) -> bool {
        self.0 & Self::ABSTRACT != 0
    }

    /// True when `final` is set.
    pub fn is_final(self) -> bool {
        self.0 & Self::FINAL != 0
    }

    /// True when `required` is set.
    pub fn is_required(self) -> bool {
        self.0 & Self::REQUIRED != 0
    }
}

/// A property argument value.
///
/// Property argument lists are heterogeneous; this is the tagged variant
/// the design calls for. Name resolution narrows `Name` arguments to bound
/// definitions in-place (see [`Arg::resolved`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// String literal
    Str(String),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Boolean literal
    Bool(bool),
    /// The `none` literal
    None,
    /// The `all` symbol (expanded by phase 1 in `implements`)
    All,
    /// The `any` symbol (universal-reference marker)
    Any,
    /// A dotted name, bound by phases 1, 3 and 4
    Name(DottedName),
}

impl Value {
    /// The contained dotted name, if this is a name argument.
    pub fn as_name(&self) -> Option<&DottedName> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The contained string, if this is a string argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The contained integer, if this is an integer argument.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The contained boolean, if this is a boolean argument.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::None => write!(f, "none"),
            Value::All => write!(f, "all"),
            Value::Any => write!(f, "any"),
            Value::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One argument of a property, with its resolution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    /// The argument value as parsed
    pub value: Value,
    /// Source location of the argument
    pub span: Span,
    /// Sort direction (`+`/`-` inside `fields` lists)
    pub direction: SortDir,
    /// The definition this argument was bound to, when it is a name
    pub resolved: Option<DefId>,
    /// The full binding path; the same definition can be contained
    /// multiple times through different members, and code generation needs
    /// the path to disambiguate
    pub resolved_path: Option<Vec<DefId>>,
}

impl Arg {
    /// Create an unresolved argument.
    pub fn new(value: Value, span: Span) -> Self {
        Self {
            value,
            span,
            direction: SortDir::Asc,
            resolved: None,
            resolved_path: None,
        }
    }
}

/// Target of a `use`/`require` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportTarget {
    /// Dotted package name, located on the search path
    Package(String),
    /// `http`/`https`/`ftp` URI
    Uri(String),
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::Package(name) => write!(f, "{}", name),
            ImportTarget::Uri(uri) => write!(f, "{:?}", uri),
        }
    }
}

/// One `use` or `require` statement of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// The imported package or URI
    pub target: ImportTarget,
    /// Alias introduced with `as`; mandatory unless the target is a
    /// single simple name
    pub alias: Option<String>,
    /// `require` propagates realization, plain `use` does not
    pub required: bool,
    /// True for the implicit `venus` import the loader adds to top schemas
    pub implicit: bool,
    /// Source location of the statement
    pub span: Span,
    /// Canonical origin of the resolved target; set by the loader
    pub origin: Option<String>,
    /// The resolved schema definition; set by the loader
    pub resolved: Option<DefId>,
}

impl Import {
    /// The name under which the imported schema is visible: the alias, or
    /// the package name for simple un-aliased imports.
    pub fn visible_name(&self) -> &str {
        match (&self.alias, &self.target) {
            (Some(alias), _) => alias,
            (None, ImportTarget::Package(name)) => name,
            (None, ImportTarget::Uri(uri)) => uri,
        }
    }
}

/// A single definition node.
///
/// Polymorphic over [`DefKind`]; the phase-derived attributes below the
/// marker comment are written by the phase named in their doc and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Kind tag
    pub kind: DefKind,
    /// Simple name, lowercased; empty for deletions
    pub name: String,
    /// Full package name; `Some` only for schemas
    pub package: Option<String>,
    /// Source location of the definition head
    pub span: Span,
    /// Statically enclosing definition; `None` for schemas
    pub parent: Option<DefId>,
    /// Child definitions in source order
    pub children: Vec<DefId>,
    /// Modifier set (phase 1 validates consistency)
    pub modifiers: Modifiers,
    /// Property arguments in source order; empty for non-properties
    pub args: Vec<Arg>,
    /// Target simple name; `Some` only for deletions
    pub delete_target: Option<String>,

    // --- phase-derived attributes ---
    /// Phase 1: resolved list of directly implemented definitions
    pub implements: Vec<DefId>,
    /// Phase 2: the unique definition whose `implements` lists this one
    pub direct_implementor: Option<DefId>,
    /// Phase 2: root of this definition's implementation tree
    ///
    /// Total for fields and fieldsets; a singleton tree's root is itself.
    pub final_implementor: Option<DefId>,
    /// Phase 2: every definition this one transitively implements
    pub specifications: Vec<DefId>,
    /// Phase 2: every definition that transitively implements this one
    pub implementations: Vec<DefId>,
    /// Phase 3: effective ancestors (imp-names dereferenced), in order
    pub ancestors: Vec<DefId>,
    /// Phase 3: inverse of `ancestors`
    pub descendants: Vec<DefId>,
    /// Phase 3: merged member table; every value is a final implementor
    pub members: IndexMap<String, DefId>,
    /// Phase 3: deletions that did not remove any inherited member
    pub unused_deletions: Vec<DefId>,
    /// Phase 5: selected for database object generation
    pub realized: bool,
    /// Phase 5: realized, outermost, and destined to become a table
    pub toplevel: bool,
}

impl Definition {
    /// Create a bare definition; the loader and parser fill in edges.
    pub fn new(kind: DefKind, name: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            name: name.into(),
            package: None,
            span,
            parent: None,
            children: Vec::new(),
            modifiers: Modifiers::empty(),
            args: Vec::new(),
            delete_target: None,
            implements: Vec::new(),
            direct_implementor: None,
            final_implementor: None,
            specifications: Vec::new(),
            implementations: Vec::new(),
            ancestors: Vec::new(),
            descendants: Vec::new(),
            members: IndexMap::new(),
            unused_deletions: Vec::new(),
            realized: false,
            toplevel: false,
        }
    }

    /// True when this definition participates in inheritance and
    /// implementation trees.
    pub fn is_structural(&self) -> bool {
        matches!(self.kind, DefKind::Field | DefKind::Fieldset)
    }
}

/// Flat arena of all definitions in a compilation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Arena {
    defs: Vec<Definition>,
}

impl Arena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a definition, returning its id.
    pub fn alloc(&mut self, def: Definition) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    /// Borrow a definition.
    pub fn def(&self, id: DefId) -> &Definition {
        &self.defs[id.0 as usize]
    }

    /// Borrow a definition mutably.
    pub fn def_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.defs[id.0 as usize]
    }

    /// Number of definitions allocated.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// All definition ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = DefId> {
        (0..self.defs.len() as u32).map(DefId)
    }

    /// Attach `child` under `parent`, keeping source order.
    pub fn attach(&mut self, parent: DefId, child: DefId) {
        self.def_mut(child).parent = Some(parent);
        self.def_mut(parent).children.push(child);
    }

    /// The statically contained child with the given name, if any.
    ///
    /// Deletions never match; they have no name of their own.
    pub fn static_child(&self, id: DefId, name: &str) -> Option<DefId> {
        self.def(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.def(c).kind != DefKind::Deletion && self.def(c).name == name)
    }

    /// The statically contained property child with the given name.
    pub fn property_child(&self, id: DefId, name: &str) -> Option<DefId> {
        self.static_child(id, name)
            .filter(|&c| self.def(c).kind == DefKind::Property)
    }

    /// True when `owner` statically contains `item` (strictly; a
    /// definition does not contain itself).
    pub fn owns(&self, owner: DefId, item: DefId) -> bool {
        let mut cursor = self.def(item).parent;
        while let Some(parent) = cursor {
            if parent == owner {
                return true;
            }
            cursor = self.def(parent).parent;
        }
        false
    }

    /// The schema that owns this definition (or the definition itself,
    /// for schemas).
    pub fn schema_of(&self, id: DefId) -> DefId {
        let mut cursor = id;
        while self.def(cursor).kind != DefKind::Schema {
            cursor = self
                .def(cursor)
                .parent
                .expect("definition graph has a non-schema root");
        }
        cursor
    }

    /// The outermost fieldset that owns this definition, if any.
    pub fn toplevel_fieldset_of(&self, id: DefId) -> Option<DefId> {
        let mut result = None;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if self.def(current).kind == DefKind::Fieldset {
                result = Some(current);
            }
            cursor = self.def(current).parent;
        }
        result
    }

    /// True when the definition is defined directly at schema level.
    pub fn is_outermost(&self, id: DefId) -> bool {
        matches!(
            self.def(id).parent,
            Some(parent) if self.def(parent).kind == DefKind::Schema
        )
    }

    /// The final implementor of a definition, falling back to the
    /// definition itself for kinds outside the implementation forest.
    ///
    /// Reliable after phase 2.
    pub fn fi(&self, id: DefId) -> DefId {
        self.def(id).final_implementor.unwrap_or(id)
    }

    /// Pre-order walk of the subtree rooted at `root`, including the root.
    pub fn subtree(&self, root: DefId) -> Vec<DefId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // push children reversed so the walk visits them in order
            for &child in self.def(id).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Dotted path of a definition, for diagnostics.
    ///
    /// Starts with the package name of the owning schema, which is unique,
    /// so the path identifies the definition.
    pub fn path(&self, id: DefId) -> String {
        let mut names = Vec::new();
        let mut cursor = id;
        loop {
            let def = self.def(cursor);
            match (&def.package, def.parent) {
                (Some(package), _) => {
                    names.push(package.clone());
                    break;
                }
                (None, Some(parent)) => {
                    if def.kind == DefKind::Deletion {
                        names.push(format!(
                            "delete {}",
                            def.delete_target.as_deref().unwrap_or("?")
                        ));
                    } else {
                        names.push(def.name.clone());
                    }
                    cursor = parent;
                }
                (None, None) => {
                    names.push(def.name.clone());
                    break;
                }
            }
        }
        names.reverse();
        names.join(".")
    }

    /// Member lookup, optionally restricted by kind.
    ///
    /// Reliable after phase 3.
    pub fn member(&self, id: DefId, name: &str, kinds: KindSet) -> Option<DefId> {
        self.def(id)
            .members
            .get(name)
            .copied()
            .filter(|&m| kinds.contains(self.def(m).kind))
    }

    /// First argument of a property member, if present.
    ///
    /// This is the property accessor the result assembly uses: `type`,
    /// `size`, `guid` and friends are all single-argument properties
    /// reached through the member table.
    pub fn singleprop(&self, id: DefId, name: &str) -> Option<&Arg> {
        let member = self.member(id, name, KindSet::only(DefKind::Property))?;
        self.def(member).args.first()
    }

    /// String value of a single-argument property member.
    pub fn prop_str(&self, id: DefId, name: &str) -> Option<&str> {
        self.singleprop(id, name).and_then(|arg| arg.value.as_str())
    }

    /// Integer value of a single-argument property member.
    pub fn prop_int(&self, id: DefId, name: &str) -> Option<i64> {
        self.singleprop(id, name).and_then(|arg| arg.value.as_int())
    }

    /// Boolean value of a single-argument property member, defaulted.
    pub fn prop_bool(&self, id: DefId, name: &str, default: bool) -> bool {
        self.singleprop(id, name)
            .and_then(|arg| arg.value.as_bool())
            .unwrap_or(default)
    }

    /// The fieldset referenced by a field's `references` property.
    ///
    /// Returns `None` for non-referencing fields and for universal
    /// references. Reliable after phase 4.
    pub fn referenced_fieldset(&self, field: DefId) -> Option<DefId> {
        let prop = self.member(field, "references", KindSet::only(DefKind::Property))?;
        self.def(prop).args.first().and_then(|arg| arg.resolved)
    }

    /// True when the field carries a universal reference (`-> any`).
    pub fn is_universal_reference(&self, field: DefId) -> bool {
        self.member(field, "references", KindSet::only(DefKind::Property))
            .map(|prop| {
                matches!(
                    self.def(prop).args.first(),
                    Some(Arg {
                        value: Value::Any,
                        ..
                    })
                )
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::zero(0)
    }

    fn small_schema(arena: &mut Arena) -> (DefId, DefId, DefId) {
        let mut schema = Definition::new(DefKind::Schema, "core", span());
        schema.package = Some("app.core".into());
        let schema = arena.alloc(schema);
        let person = arena.alloc(Definition::new(DefKind::Fieldset, "person", span()));
        arena.attach(schema, person);
        let name = arena.alloc(Definition::new(DefKind::Field, "name", span()));
        arena.attach(person, name);
        (schema, person, name)
    }

    #[test]
    fn ownership_queries() {
        let mut arena = Arena::new();
        let (schema, person, name) = small_schema(&mut arena);

        assert!(arena.owns(schema, name));
        assert!(arena.owns(person, name));
        assert!(!arena.owns(name, person));
        assert!(!arena.owns(person, person));

        assert_eq!(arena.schema_of(name), schema);
        assert!(arena.is_outermost(person));
        assert!(!arena.is_outermost(name));
        assert_eq!(arena.toplevel_fieldset_of(name), Some(person));
    }

    #[test]
    fn static_child_skips_deletions() {
        let mut arena = Arena::new();
        let (_, person, name) = small_schema(&mut arena);
        let mut deletion = Definition::new(DefKind::Deletion, "", span());
        deletion.delete_target = Some("name".into());
        let deletion = arena.alloc(deletion);
        arena.attach(person, deletion);

        assert_eq!(arena.static_child(person, "name"), Some(name));
    }

    #[test]
    fn paths_start_with_package_name() {
        let mut arena = Arena::new();
        let (_, _, name) = small_schema(&mut arena);
        assert_eq!(arena.path(name), "app.core.person.name");
    }

    #[test]
    fn fi_defaults_to_self() {
        let mut arena = Arena::new();
        let (_, person, _) = small_schema(&mut arena);
        assert_eq!(arena.fi(person), person);
    }

    #[test]
    fn subtree_is_preorder() {
        let mut arena = Arena::new();
        let (schema, person, name) = small_schema(&mut arena);
        assert_eq!(arena.subtree(schema), vec![schema, person, name]);
    }
}
