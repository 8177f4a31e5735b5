//! Static and dynamic name binding.
//!
//! Two regimes share one arena:
//!
//! - **Static binding** walks lexical structure only: the children of the
//!   site, then outward through `static_parent` up to the schema. Used for
//!   `implements` (phase 1) and `ancestors` (phase 3).
//! - **Dynamic binding** consults the merged member tables built by phase
//!   3, falls back to static children *dereferenced to their final
//!   implementor* ("mixed binding", which lets references survive
//!   reimplementation under a different name), and retries at the static
//!   parent on failure (acquisition). Used for everything else (phase 4).
//!
//! Both regimes consult the import alias table of the enclosing schema
//! when the head segment does not resolve locally, and both accept a
//! `schema.`-prefixed absolute form that starts at the enclosing schema.
//! A name spelled with the schema's own package name instead of the
//! `schema.` prefix still binds, with a style warning.
//!
//! Results are paths, not single nodes: the same definition can be
//! contained multiple times through different members, and later code
//! generation needs the path for disambiguated names.

use crate::ast::{Arena, DefId};
use crate::foundation::{DottedName, KindSet};
use crate::registry::Registry;

/// A successful binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// Path from the resolution root down to the bound definition
    pub path: Vec<DefId>,
    /// True when the name was matched against the schema's own package
    /// name rather than the `schema.` prefix; callers emit a style
    /// warning
    pub via_package_name: bool,
}

impl Bound {
    fn new(path: Vec<DefId>) -> Self {
        Self {
            path,
            via_package_name: false,
        }
    }

    /// The bound definition (last element of the path).
    pub fn target(&self) -> DefId {
        *self.path.last().expect("bound paths are non-empty")
    }
}

/// Name binder over the definition arena and the schema registry.
pub struct Binder<'a> {
    arena: &'a Arena,
    registry: &'a Registry,
}

impl<'a> Binder<'a> {
    /// Create a binder.
    pub fn new(arena: &'a Arena, registry: &'a Registry) -> Self {
        Self { arena, registry }
    }

    /// The kind restriction in effect for a name: its own min-classes
    /// bracket, or the context default.
    pub fn effective_kinds(name: &DottedName, default: KindSet) -> KindSet {
        name.min_classes.unwrap_or(default)
    }

    /// Bind a name statically from `site`.
    ///
    /// `exclude` removes one definition from consideration; the ancestor
    /// binder passes the owning definition here so that
    /// `fieldset location : location` finds the outer `location`.
    pub fn bind_static(
        &self,
        site: DefId,
        name: &DottedName,
        kinds: KindSet,
        exclude: Option<DefId>,
    ) -> Option<Bound> {
        self.bind_common(site, name, kinds, exclude, &Self::static_step)
    }

    /// Bind a name dynamically from `site`.
    ///
    /// Reliable after phase 3; member tables must be built.
    pub fn bind_dynamic(
        &self,
        site: DefId,
        name: &DottedName,
        kinds: KindSet,
    ) -> Option<Bound> {
        self.bind_common(site, name, kinds, None, &Self::dynamic_step)
    }

    fn bind_common(
        &self,
        site: DefId,
        name: &DottedName,
        kinds: KindSet,
        exclude: Option<DefId>,
        step: &dyn Fn(&Self, DefId, &[String], KindSet, Option<DefId>, bool) -> Option<Vec<DefId>>,
    ) -> Option<Bound> {
        let schema = self.arena.schema_of(site);

        // Normal resolution: absolute names start at the schema, relative
        // names at the site and walk outward.
        let path = if name.absolute {
            step(self, schema, &name.segments, kinds, exclude, false)
        } else {
            step(self, site, &name.segments, kinds, exclude, true)
        };
        if let Some(path) = path {
            return Some(Bound::new(path));
        }

        // Imported schemas, by alias or simple package name.
        if let Some(record) = self.registry.by_def(schema) {
            for import in &record.imports {
                let Some(target) = import.resolved else {
                    continue;
                };
                if let Some(rest) = name.strip_prefix(import.visible_name()) {
                    if let Some(mut path) = step(self, target, &rest, kinds, exclude, false) {
                        path.insert(0, target);
                        return Some(Bound::new(path));
                    }
                }
            }

            // The schema's own package name used instead of `schema.`.
            if !name.absolute {
                if let Some(rest) = name.strip_prefix(&record.package) {
                    if let Some(mut path) = step(self, schema, &rest, kinds, exclude, false) {
                        path.insert(0, schema);
                        return Some(Bound {
                            path,
                            via_package_name: true,
                        });
                    }
                }
            }
        }

        None
    }

    /// One static resolution step: children of `ctx`, then outward when
    /// `recursive` is set.
    fn static_step(
        &self,
        ctx: DefId,
        segments: &[String],
        kinds: KindSet,
        exclude: Option<DefId>,
        recursive: bool,
    ) -> Option<Vec<DefId>> {
        if let Some(child) = self.arena.static_child(ctx, &segments[0]) {
            if segments.len() == 1 {
                if kinds.contains(self.arena.def(child).kind) && Some(child) != exclude {
                    return Some(vec![child]);
                }
            } else if let Some(mut rest) =
                self.static_step(child, &segments[1..], kinds, exclude, false)
            {
                rest.insert(0, child);
                return Some(rest);
            }
        }
        if recursive {
            if let Some(parent) = self.arena.def(ctx).parent {
                return self.static_step(parent, segments, kinds, exclude, true);
            }
        }
        None
    }

    /// One dynamic resolution step: members of `ctx`, then static
    /// children dereferenced to their final implementor, then acquisition
    /// through the static parent.
    ///
    /// The kind restriction applies to the final segment only.
    fn dynamic_step(
        &self,
        ctx: DefId,
        segments: &[String],
        kinds: KindSet,
        exclude: Option<DefId>,
        recursive: bool,
    ) -> Option<Vec<DefId>> {
        let first = &segments[0];

        if let Some(&member) = self.arena.def(ctx).members.get(first) {
            if segments.len() == 1 {
                if kinds.contains(self.arena.def(member).kind) && Some(member) != exclude {
                    return Some(vec![member]);
                }
            } else if let Some(mut rest) =
                self.dynamic_step(member, &segments[1..], kinds, exclude, false)
            {
                rest.insert(0, member);
                return Some(rest);
            }
        }

        if let Some(child) = self.arena.static_child(ctx, first) {
            let head = self.arena.fi(child);
            if segments.len() == 1 {
                if kinds.contains(self.arena.def(head).kind) && Some(head) != exclude {
                    return Some(vec![head]);
                }
            } else if let Some(mut rest) =
                self.dynamic_step(head, &segments[1..], kinds, exclude, false)
            {
                rest.insert(0, head);
                return Some(rest);
            }
        }

        if recursive {
            if let Some(parent) = self.arena.def(ctx).parent {
                return self.dynamic_step(parent, segments, kinds, exclude, true);
            }
        }
        None
    }
}
