//! Phase 2: implementation trees.
//!
//! Partitions all field and fieldset definitions into implementation
//! trees and computes the total `final_implementor` function. A tree's
//! root is the definition the database will actually realize; everything
//! below it is specification.
//!
//! 1. direct implementor assignment (at most one per definition)
//! 2. imp-name ancestor constraint
//! 3. final-implementor computation
//! 4. modifier consistency against trees
//! 5. intra-tree static-containment check
//! 6. specification/implementation closure caches

use crate::ast::DefId;
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::loader::Loaded;
use std::collections::HashMap;

/// Run phase 2.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    step1_direct_implementors(state, diags);
    if diags.has_error() {
        return;
    }
    step2_imp_ancestor_constraint(state, diags);
    if diags.has_error() {
        return;
    }
    step3_final_implementors(state, diags);
    if diags.has_error() {
        return;
    }
    step4_modifiers(state, diags);
    if diags.has_error() {
        return;
    }
    step5_containment(state, diags);
    if diags.has_error() {
        return;
    }
    step6_closures(state);
}

fn structural_ids(state: &Loaded) -> Vec<DefId> {
    state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).is_structural())
        .collect()
}

/// Every definition has at most one direct implementor across the whole
/// compilation.
fn step1_direct_implementors(state: &mut Loaded, diags: &mut Diagnostics) {
    let mut implementors: HashMap<DefId, Vec<DefId>> = HashMap::new();
    for id in structural_ids(state) {
        for &spec in &state.arena.def(id).implements {
            implementors.entry(spec).or_default().push(id);
        }
    }
    for id in structural_ids(state) {
        match implementors.get(&id).map(Vec::as_slice) {
            Some([single]) => {
                state.arena.def_mut(id).direct_implementor = Some(*single);
            }
            Some(multiple) if multiple.len() > 1 => {
                let mut diag = Diagnostic::error(
                    DiagKind::BadImplements,
                    Code(2011),
                    state.arena.def(id).span,
                    format!(
                        "multiple definitions want to implement '{}'",
                        state.arena.path(id)
                    ),
                );
                for &imp in multiple {
                    diag = diag.with_label(state.arena.def(imp).span, "implemented here");
                }
                diags.push(diag);
            }
            _ => {
                state.arena.def_mut(id).direct_implementor = None;
            }
        }
    }
}

/// True when the definition lists at least one imp-name ancestor.
pub(crate) fn has_imp_ancestor(state: &Loaded, id: DefId) -> bool {
    state
        .arena
        .property_child(id, "ancestors")
        .map(|prop| {
            state
                .arena
                .def(prop)
                .args
                .iter()
                .any(|arg| arg.value.as_name().map(|n| n.imp).unwrap_or(false))
        })
        .unwrap_or(false)
}

/// A definition with an imp-name ancestor cannot itself be implemented:
/// its effective ancestry depends on final implementors, which would make
/// the trees mutually dependent.
fn step2_imp_ancestor_constraint(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in structural_ids(state) {
        if state.arena.def(id).direct_implementor.is_some() && has_imp_ancestor(state, id) {
            diags.push(Diagnostic::error(
                DiagKind::BadImplements,
                Code(2021),
                state.arena.def(id).span,
                "cannot implement a definition that has imp-name ancestors",
            ));
        }
    }
}

/// Follow `direct_implementor` to the root of each tree and cache the
/// result on every definition along the way.
fn step3_final_implementors(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in structural_ids(state) {
        if state.arena.def(id).final_implementor.is_some() {
            continue;
        }
        let mut chain = vec![id];
        let mut cursor = id;
        let root = loop {
            match state.arena.def(cursor).final_implementor {
                Some(root) => break root,
                None => match state.arena.def(cursor).direct_implementor {
                    Some(next) => {
                        if chain.contains(&next) {
                            // Phase 1 step 7 rejects cycles; reaching one
                            // here is a compiler bug.
                            diags.push(Diagnostic::error(
                                DiagKind::Internal,
                                Code(9021),
                                state.arena.def(next).span,
                                "implementation cycle survived phase 1",
                            ));
                            break next;
                        }
                        chain.push(next);
                        cursor = next;
                    }
                    None => break cursor,
                },
            }
        };
        for link in chain {
            state.arena.def_mut(link).final_implementor = Some(root);
        }
    }
}

/// `final` definitions must be their own final implementor; definitions
/// that are both `abstract` and `required` must not be (something has to
/// implement them eventually).
fn step4_modifiers(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in structural_ids(state) {
        let def = state.arena.def(id);
        let fi = state.arena.fi(id);
        if fi == id && def.modifiers.is_abstract() && def.modifiers.is_required() {
            diags.push(Diagnostic::error(
                DiagKind::BadModifier,
                Code(2041),
                def.span,
                format!(
                    "abstract definition '{}' has no implementation",
                    state.arena.path(id)
                ),
            ));
        }
        if fi != id && def.modifiers.is_final() {
            diags.push(
                Diagnostic::error(
                    DiagKind::BadModifier,
                    Code(2042),
                    def.span,
                    format!(
                        "'{}' is final but something implements it",
                        state.arena.path(id)
                    ),
                )
                .with_label(state.arena.def(fi).span, "final implementor here"),
            );
        }
    }
}

/// Within one implementation tree, no two definitions may statically
/// contain each other.
fn step5_containment(state: &mut Loaded, diags: &mut Diagnostics) {
    let mut trees: HashMap<DefId, Vec<DefId>> = HashMap::new();
    for id in structural_ids(state) {
        trees.entry(state.arena.fi(id)).or_default().push(id);
    }
    // Trees are small, so the pairwise check is fine.
    for members in trees.values() {
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                let (outer, inner) = if state.arena.owns(a, b) {
                    (a, b)
                } else if state.arena.owns(b, a) {
                    (b, a)
                } else {
                    continue;
                };
                diags.push(
                    Diagnostic::error(
                        DiagKind::Containment,
                        Code(2051),
                        state.arena.def(inner).span,
                        "definitions in the same implementation tree cannot contain each other",
                    )
                    .with_label(state.arena.def(outer).span, "contained by this definition"),
                );
            }
        }
    }
}

/// Cache the specification and implementation closures.
///
/// `specifications(x)` is everything x transitively implements;
/// `implementations(x)` is the chain of implementors above x.
fn step6_closures(state: &mut Loaded) {
    for id in structural_ids(state) {
        let mut cursor = state.arena.def(id).direct_implementor;
        while let Some(above) = cursor {
            state.arena.def_mut(above).specifications.push(id);
            state.arena.def_mut(id).implementations.push(above);
            cursor = state.arena.def(above).direct_implementor;
        }
    }
    // Deterministic order; deduplicated so a rerun over annotated state
    // is a no-op.
    for id in structural_ids(state) {
        let def = state.arena.def_mut(id);
        def.specifications.sort();
        def.specifications.dedup();
        def.implementations.sort();
        def.implementations.dedup();
    }
}
