//! Phase 5: the realization fixpoint.
//!
//! Decides which definitions become database objects. Realization is a
//! monotonic fixed point over two boolean flags:
//!
//! 1. top schemas are realized; `require` edges propagate realization
//!    between schemas (plain `use` does not),
//! 2. an outermost `required` fieldset of a realized schema realizes its
//!    final implementor, which becomes toplevel (a table),
//! 3. every member of a realized fieldset is realized (not toplevel),
//! 4. a realized field referencing a concrete fieldset realizes the
//!    target's final implementor as toplevel; universal references (`any`)
//!    propagate nothing,
//! 5. steps 2-4 repeat until stable, then realization flows to the
//!    specifications of every realized definition,
//! 6. a realized final implementation must not be abstract.

use crate::ast::DefId;
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{DefKind, KindSet};
use crate::loader::Loaded;

/// Run phase 5.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    realize_schemas(state);
    seed_required_fieldsets(state, diags);
    if diags.has_error() {
        return;
    }
    fixpoint(state);
    propagate_to_specifications(state);
    check_abstract(state, diags);
}

/// Top schemas are realized; `require` propagates until stable.
fn realize_schemas(state: &mut Loaded) {
    let mut realized: Vec<DefId> = state
        .registry
        .iter()
        .filter(|r| r.is_top)
        .map(|r| r.def)
        .collect();
    let mut changed = true;
    while changed {
        changed = false;
        let current = realized.clone();
        for def in current {
            let Some(record) = state.registry.by_def(def) else {
                continue;
            };
            let targets: Vec<DefId> = record
                .imports
                .iter()
                .filter(|import| import.required)
                .filter_map(|import| import.resolved)
                .collect();
            for target in targets {
                if !realized.contains(&target) {
                    realized.push(target);
                    changed = true;
                }
            }
        }
    }
    for record in state.registry.iter_mut() {
        record.realized = realized.contains(&record.def);
    }
    for def in realized {
        state.arena.def_mut(def).realized = true;
    }
}

/// An outermost `required` fieldset in a realized schema realizes its
/// final implementor as a toplevel fieldset. The final implementor must
/// itself be outermost.
fn seed_required_fieldsets(state: &mut Loaded, diags: &mut Diagnostics) {
    let schemas: Vec<DefId> = state
        .registry
        .iter()
        .filter(|r| r.realized)
        .map(|r| r.def)
        .collect();
    for schema in schemas {
        for child in state.arena.def(schema).children.clone() {
            let def = state.arena.def(child);
            if def.kind != DefKind::Fieldset || !def.modifiers.is_required() {
                continue;
            }
            let fi = state.arena.fi(child);
            if state.arena.is_outermost(fi) {
                let target = state.arena.def_mut(fi);
                target.realized = true;
                target.toplevel = true;
            } else {
                diags.push(
                    Diagnostic::error(
                        DiagKind::Realization,
                        Code(5011),
                        state.arena.def(child).span,
                        "the final implementation of a required outermost fieldset \
                         must be outermost",
                    )
                    .with_label(state.arena.def(fi).span, "final implementation here"),
                );
            }
        }
    }
}

/// Propagate realization through membership and references until stable.
fn fixpoint(state: &mut Loaded) {
    let structural = KindSet::only(DefKind::Field).with(DefKind::Fieldset);
    loop {
        let mut changed = false;

        // Members of realized fieldsets are realized, not toplevel.
        let realized_fieldsets: Vec<DefId> = state
            .arena
            .ids()
            .filter(|&id| {
                let def = state.arena.def(id);
                def.kind == DefKind::Fieldset && def.realized
            })
            .collect();
        for fieldset in realized_fieldsets {
            let members: Vec<DefId> = state
                .arena
                .contained_paths(fieldset, structural)
                .map(|path| *path.last().expect("paths are non-empty"))
                .collect();
            for member in members {
                if !state.arena.def(member).realized {
                    state.arena.def_mut(member).realized = true;
                    changed = true;
                }
            }
        }

        // Concrete references of realized fields realize their target.
        let realized_fields: Vec<DefId> = state
            .arena
            .ids()
            .filter(|&id| {
                let def = state.arena.def(id);
                def.kind == DefKind::Field && def.realized
            })
            .collect();
        for field in realized_fields {
            let Some(target) = state.arena.referenced_fieldset(field) else {
                continue;
            };
            let fi = state.arena.fi(target);
            let def = state.arena.def_mut(fi);
            if !def.realized || !def.toplevel {
                def.realized = true;
                def.toplevel = true;
                changed = true;
            }
        }

        if !changed {
            return;
        }
    }
}

/// A realized definition realizes its specifications (never as toplevel).
fn propagate_to_specifications(state: &mut Loaded) {
    let mut changed = true;
    while changed {
        changed = false;
        for id in state.arena.ids().collect::<Vec<_>>() {
            if !state.arena.def(id).realized {
                continue;
            }
            for spec in state.arena.def(id).specifications.clone() {
                if !state.arena.def(spec).realized {
                    state.arena.def_mut(spec).realized = true;
                    changed = true;
                }
            }
        }
    }
}

/// No realized final implementation may be abstract.
fn check_abstract(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.is_structural()
            && def.realized
            && def.modifiers.is_abstract()
            && state.arena.fi(id) == id
        {
            diags.push(Diagnostic::error(
                DiagKind::Realization,
                Code(5031),
                def.span,
                format!(
                    "abstract definition '{}' must be realized but has no implementation",
                    state.arena.path(id)
                ),
            ));
        }
    }
}
