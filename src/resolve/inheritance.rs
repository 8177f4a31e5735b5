//! Phase 3: the inheritance graph and member synthesis.
//!
//! Resolves the `ancestors` property, builds the inheritance DAG over
//! *effective* ancestors (imp-names dereferenced to final implementors)
//! and computes the ordered member table of every definition.
//!
//! Ancestor name binding is hybrid: the dotted name is resolved
//! statically to a definition `D`; when written with the leading `=` the
//! ancestor actually used is `final_implementor(D)`. The enclosing
//! definition is excluded from the search, which permits the idiom
//! `fieldset location : location`.
//!
//! Member synthesis merges, in order: the member tables of the directly
//! implemented specifications (property values flow from specification to
//! implementor), the member tables of the effective ancestors, and the
//! statically contained children dereferenced to their final
//! implementors. Inherited entries keep their original position when
//! overwritten; a static overwrite moves the entry to the current
//! insertion point. `delete <name>;` filters inherited entries only.

use crate::ast::{Arg, DefId};
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{DefKind, KindSet};
use crate::loader::Loaded;
use crate::resolve::binder::Binder;
use crate::resolve::implementation::has_imp_ancestor;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Run phase 3.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    step1_resolve_ancestors(state, diags);
    if diags.has_error() {
        return;
    }
    step2_acyclic(state, diags);
    if diags.has_error() {
        return;
    }
    step3_no_impl_rule(state, diags);
    if diags.has_error() {
        return;
    }
    step4_effective_ancestors(state);
    step5_containment(state, diags);
    if diags.has_error() {
        return;
    }
    step6_members(state, diags);
    if diags.has_error() {
        return;
    }
    step7_unused_deletions(state, diags);
}

/// Statically bind every `ancestors` argument.
fn step1_resolve_ancestors(state: &mut Loaded, diags: &mut Diagnostics) {
    let props: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| {
            let def = state.arena.def(id);
            def.kind == DefKind::Property && def.name == "ancestors"
        })
        .collect();

    for prop in props {
        let Some(owner) = state.arena.def(prop).parent else {
            continue;
        };
        if !state.arena.def(owner).is_structural() {
            diags.push(Diagnostic::error(
                DiagKind::BadAncestor,
                Code(3011),
                state.arena.def(prop).span,
                "'ancestors' can only be used inside fields and fieldsets",
            ));
            continue;
        }
        let owner_kind = state.arena.def(owner).kind;
        let good_kinds = KindSet::only(owner_kind);

        for arg_idx in 0..state.arena.def(prop).args.len() {
            let arg = state.arena.def(prop).args[arg_idx].clone();
            let Some(name) = arg.value.as_name() else {
                diags.push(Diagnostic::error(
                    DiagKind::BadAncestor,
                    Code(3012),
                    arg.span,
                    format!("only dotted names can be ancestors, not {}", arg.value),
                ));
                continue;
            };
            if let Some(explicit) = name.min_classes {
                if explicit != good_kinds {
                    let msg = match owner_kind {
                        DefKind::Field => "fields can only inherit from fields",
                        _ => "fieldsets can only inherit from fieldsets",
                    };
                    diags.push(Diagnostic::error(
                        DiagKind::BadAncestor,
                        Code(3013),
                        arg.span,
                        msg,
                    ));
                    continue;
                }
            }

            let binder = Binder::new(&state.arena, &state.registry);
            match binder.bind_static(owner, name, good_kinds, Some(owner)) {
                Some(bound) => {
                    let target = bound.target();
                    let path = bound.path.clone();
                    if state.arena.owns(target, prop) {
                        diags.push(
                            Diagnostic::error(
                                DiagKind::Containment,
                                Code(3015),
                                arg.span,
                                "descendant cannot statically contain its ancestor",
                            )
                            .with_label(state.arena.def(target).span, "ancestor here"),
                        );
                    } else if state.arena.owns(owner, target) {
                        diags.push(
                            Diagnostic::error(
                                DiagKind::Containment,
                                Code(3016),
                                arg.span,
                                "ancestor cannot statically contain its descendant",
                            )
                            .with_label(state.arena.def(target).span, "ancestor here"),
                        );
                    } else {
                        let slot = &mut state.arena.def_mut(prop).args[arg_idx];
                        slot.resolved = Some(target);
                        slot.resolved_path = Some(path);
                    }
                }
                None => {
                    // Rebind without the exclusion to distinguish
                    // self-ancestry from a genuinely unknown name.
                    let self_bound = binder
                        .bind_static(owner, name, good_kinds, None)
                        .map(|b| b.target());
                    if self_bound == Some(owner) {
                        diags.push(Diagnostic::error(
                            DiagKind::BadAncestor,
                            Code(3017),
                            arg.span,
                            "nothing can be its own ancestor",
                        ));
                    } else {
                        diags.push(Diagnostic::error(
                            DiagKind::UnresolvedName,
                            Code(3014),
                            arg.span,
                            format!("definition '{}' not found", name),
                        ));
                    }
                }
            }
        }
    }
}

/// Statically bound ancestor references of a definition, in order.
fn static_ancestor_refs(state: &Loaded, id: DefId) -> Vec<(Arg, DefId)> {
    state
        .arena
        .property_child(id, "ancestors")
        .map(|prop| {
            state
                .arena
                .def(prop)
                .args
                .iter()
                .filter_map(|arg| arg.resolved.map(|target| (arg.clone(), target)))
                .collect()
        })
        .unwrap_or_default()
}

/// The ancestor relation must be acyclic.
///
/// The check runs on the statically bound references; imp-name
/// dereferencing cannot introduce a cycle on top of an acyclic static
/// graph because definitions with imp-name ancestors can neither
/// implement nor be implemented.
fn step2_acyclic(state: &mut Loaded, diags: &mut Diagnostics) {
    let mut graph: HashMap<DefId, Vec<DefId>> = HashMap::new();
    for id in state.arena.ids() {
        if state.arena.def(id).is_structural() {
            graph.insert(
                id,
                static_ancestor_refs(state, id)
                    .into_iter()
                    .map(|(_, t)| t)
                    .collect(),
            );
        }
    }

    let mut visited: HashSet<DefId> = HashSet::new();
    let mut on_stack: HashSet<DefId> = HashSet::new();
    for &id in graph.keys() {
        if visited.contains(&id) {
            continue;
        }
        if let Some(cycle) = dfs(&graph, id, &mut visited, &mut on_stack, &mut Vec::new()) {
            let chain = cycle
                .iter()
                .map(|&d| state.arena.path(d))
                .collect::<Vec<_>>()
                .join(" -> ");
            diags.push(Diagnostic::error(
                DiagKind::Cycle,
                Code(3021),
                state.arena.def(cycle[0]).span,
                format!("circular ancestry: {}", chain),
            ));
            return;
        }
    }
}

fn dfs(
    graph: &HashMap<DefId, Vec<DefId>>,
    id: DefId,
    visited: &mut HashSet<DefId>,
    on_stack: &mut HashSet<DefId>,
    path: &mut Vec<DefId>,
) -> Option<Vec<DefId>> {
    visited.insert(id);
    on_stack.insert(id);
    path.push(id);
    if let Some(next) = graph.get(&id) {
        for &anc in next {
            if !visited.contains(&anc) {
                if let Some(cycle) = dfs(graph, anc, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(&anc) {
                let start = path.iter().position(|&d| d == anc).expect("on stack");
                let mut cycle = path[start..].to_vec();
                cycle.push(anc);
                return Some(cycle);
            }
        }
    }
    on_stack.remove(&id);
    path.pop();
    None
}

/// A definition with imp-name ancestors cannot implement anything.
fn step3_no_impl_rule(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        if !state.arena.def(id).is_structural() {
            continue;
        }
        if !state.arena.def(id).implements.is_empty() && has_imp_ancestor(state, id) {
            diags.push(Diagnostic::error(
                DiagKind::BadAncestor,
                Code(3031),
                state.arena.def(id).span,
                "definitions with imp-name ancestors cannot implement other definitions",
            ));
        }
    }
}

/// Compute effective ancestors (imp-names dereferenced) and the direct
/// descendant sets.
fn step4_effective_ancestors(state: &mut Loaded) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        if !state.arena.def(id).is_structural() {
            continue;
        }
        let effective: Vec<DefId> = static_ancestor_refs(state, id)
            .into_iter()
            .map(|(arg, target)| {
                let imp = arg.value.as_name().map(|n| n.imp).unwrap_or(false);
                if imp {
                    state.arena.fi(target)
                } else {
                    target
                }
            })
            .collect();
        for &anc in &effective {
            state.arena.def_mut(anc).descendants.push(id);
        }
        state.arena.def_mut(id).ancestors = effective;
    }
    for id in state.arena.ids().collect::<Vec<_>>() {
        state.arena.def_mut(id).descendants.sort();
        state.arena.def_mut(id).descendants.dedup();
    }
}

/// Within one inheritance graph no definition may statically contain
/// another; imp-name dereferencing may have moved an ancestor far from
/// where it was written, so the check runs on effective edges.
fn step5_containment(state: &mut Loaded, diags: &mut Diagnostics) {
    let ids: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).is_structural())
        .collect();
    let mut remaining: HashSet<DefId> = ids.iter().copied().collect();

    while let Some(&seed) = remaining.iter().next() {
        // Collect the weakly connected component of the seed.
        let mut component = Vec::new();
        let mut queue = vec![seed];
        remaining.remove(&seed);
        while let Some(current) = queue.pop() {
            component.push(current);
            let def = state.arena.def(current);
            for &next in def.ancestors.iter().chain(def.descendants.iter()) {
                if remaining.remove(&next) {
                    queue.push(next);
                }
            }
        }
        // Inheritance graphs are small, so the pairwise check is fine.
        for (i, &a) in component.iter().enumerate() {
            for &b in &component[i + 1..] {
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
                        Code(3051),
                        state.arena.def(inner).span,
                        "definitions in the same inheritance graph cannot contain each other",
                    )
                    .with_label(state.arena.def(outer).span, "contained by this definition"),
                );
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum BuildState {
    Unvisited,
    InProgress,
    Done,
}

/// Build the member table of every definition.
fn step6_members(state: &mut Loaded, diags: &mut Diagnostics) {
    let mut build = vec![BuildState::Unvisited; state.arena.len()];
    for id in state.arena.ids().collect::<Vec<_>>() {
        build_members(state, id, &mut build, diags);
    }
}

fn build_members(
    state: &mut Loaded,
    id: DefId,
    build: &mut Vec<BuildState>,
    diags: &mut Diagnostics,
) {
    match build[id.0 as usize] {
        BuildState::Done => return,
        BuildState::InProgress => {
            // Earlier steps reject every cycle that could lead here.
            diags.push(Diagnostic::error(
                DiagKind::Internal,
                Code(9031),
                state.arena.def(id).span,
                "member synthesis entered a cycle",
            ));
            return;
        }
        BuildState::Unvisited => {}
    }
    build[id.0 as usize] = BuildState::InProgress;

    let deletions: HashMap<String, DefId> = state
        .arena
        .def(id)
        .children
        .iter()
        .filter(|&&c| state.arena.def(c).kind == DefKind::Deletion)
        .filter_map(|&c| {
            state
                .arena
                .def(c)
                .delete_target
                .clone()
                .map(|target| (target, c))
        })
        .collect();
    let mut used_deletions: HashSet<String> = HashSet::new();
    let mut table: IndexMap<String, DefId> = IndexMap::new();

    // Inherited sources: direct specifications first (property values
    // flow through implementation trees), then effective ancestors.
    let specs = state.arena.def(id).implements.clone();
    let ancestors = state.arena.def(id).ancestors.clone();
    for source in specs.into_iter().chain(ancestors) {
        build_members(state, source, build, diags);
        for (name, member) in state.arena.def(source).members.clone() {
            if name == "implements" || name == "ancestors" {
                continue;
            }
            if deletions.contains_key(&name) {
                used_deletions.insert(name);
                continue;
            }
            // Keeps the original position on overwrite.
            table.insert(name, member);
        }
    }

    // Static children, dereferenced to their final implementors. An
    // overwrite moves the entry to the current insertion point.
    for child in state.arena.def(id).children.clone() {
        if state.arena.def(child).kind == DefKind::Deletion {
            continue;
        }
        let target = state.arena.fi(child);
        let name = state.arena.def(target).name.clone();
        if table.contains_key(&name) {
            table.shift_remove(&name);
        }
        table.insert(name, target);
    }

    let mut unused: Vec<DefId> = deletions
        .iter()
        .filter(|(target, _)| !used_deletions.contains(*target))
        .map(|(_, &del)| del)
        .collect();
    unused.sort();

    let def = state.arena.def_mut(id);
    def.members = table;
    def.unused_deletions = unused;
    build[id.0 as usize] = BuildState::Done;
}

/// A `delete` that removed nothing earns a warning.
fn step7_unused_deletions(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        for &deletion in &state.arena.def(id).unused_deletions {
            diags.push(Diagnostic::warning(
                DiagKind::BadProperty,
                Code(3071),
                state.arena.def(deletion).span,
                "useless use of name deletion",
            ));
        }
    }
}
