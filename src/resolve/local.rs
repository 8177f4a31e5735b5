//! Phase 1: per-schema semantic checks.
//!
//! Runs seven steps in order; every violation in a step is reported
//! before the step boundary decides whether to continue.
//!
//! 1. self-import and duplicate imports
//! 2. identifier legality (reserved words, `id`)
//! 3. block-level name uniqueness
//! 4. special-property kinds
//! 5. modifier consistency
//! 6. `implements` resolution (static binding, `all` expansion)
//! 7. implementation acyclicity

use crate::ast::{DefId, Value};
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{DefKind, DottedName, KindSet};
use crate::lexer::{is_reserved_property_name, is_reserved_word};
use crate::loader::Loaded;
use crate::resolve::binder::Binder;
use std::collections::HashMap;

/// Run phase 1. Returns early (leaving `diags` with errors) when a step
/// fails.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    let steps: [fn(&mut Loaded, &mut Diagnostics); 7] = [
        step1_imports,
        step2_identifiers,
        step3_block_uniqueness,
        step4_special_properties,
        step5_modifiers,
        step6_implements,
        step7_implements_acyclic,
    ];
    for step in steps {
        step(state, diags);
        if diags.has_error() {
            return;
        }
    }
}

/// Nothing can `use` or `require` itself, and no target may be imported
/// twice from one schema.
fn step1_imports(state: &mut Loaded, diags: &mut Diagnostics) {
    for record in state.registry.iter() {
        let mut seen: HashMap<&str, &crate::ast::Import> = HashMap::new();
        for import in &record.imports {
            let Some(origin) = import.origin.as_deref() else {
                continue;
            };
            if origin == record.origin {
                diags.push(Diagnostic::error(
                    DiagKind::BadImport,
                    Code(1011),
                    import.span,
                    "nothing can 'use' or 'require' itself",
                ));
                continue;
            }
            if let Some(first) = seen.get(origin) {
                diags.push(
                    Diagnostic::error(
                        DiagKind::BadImport,
                        Code(1012),
                        import.span,
                        format!("'{}' is imported more than once", import.target),
                    )
                    .with_label(first.span, "first imported here"),
                );
            } else {
                seen.insert(origin, import);
            }
        }
    }
}

/// Reserved words and `id` cannot name definitions or aliases.
fn step2_identifiers(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.kind == DefKind::Schema || def.kind == DefKind::Deletion {
            continue;
        }
        if is_reserved_word(&def.name)
            && !(def.kind == DefKind::Property && is_reserved_property_name(&def.name))
        {
            diags.push(Diagnostic::error(
                DiagKind::ReservedName,
                Code(1021),
                def.span,
                format!("'{}' is a reserved word", def.name),
            ));
        }
        if def.name == "id" {
            diags.push(Diagnostic::error(
                DiagKind::ReservedName,
                Code(1022),
                def.span,
                "'id' is an invalid name (generated identifier columns use it)",
            ));
        }
    }
    for record in state.registry.iter() {
        for import in &record.imports {
            if let Some(alias) = &import.alias {
                if is_reserved_word(alias) || is_reserved_property_name(alias) || alias == "id" {
                    diags.push(Diagnostic::error(
                        DiagKind::ReservedName,
                        Code(1023),
                        import.span,
                        format!("'{}' cannot be used as an import alias", alias),
                    ));
                }
            }
        }
    }
}

/// Within any single block, child names, deletion targets, and (at schema
/// level) import names form a set.
fn step3_block_uniqueness(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.children.is_empty() {
            continue;
        }
        let mut seen: HashMap<String, crate::foundation::Span> = HashMap::new();
        if def.kind == DefKind::Schema {
            if let Some(record) = state.registry.by_def(id) {
                for import in &record.imports {
                    if import.implicit {
                        continue;
                    }
                    let name = import.visible_name().to_string();
                    if let Some(&first) = seen.get(&name) {
                        diags.push(
                            Diagnostic::error(
                                DiagKind::DuplicateName,
                                Code(1031),
                                import.span,
                                format!("duplicated name '{}'", name),
                            )
                            .with_label(first, "first defined here"),
                        );
                    } else {
                        seen.insert(name, import.span);
                    }
                }
            }
        }
        for &child in &def.children {
            let child_def = state.arena.def(child);
            let name = match child_def.kind {
                DefKind::Deletion => child_def.delete_target.clone().unwrap_or_default(),
                _ => child_def.name.clone(),
            };
            if name.is_empty() {
                continue;
            }
            if let Some(&first) = seen.get(&name) {
                diags.push(
                    Diagnostic::error(
                        DiagKind::DuplicateName,
                        Code(1031),
                        child_def.span,
                        format!("duplicated name '{}'", name),
                    )
                    .with_label(first, "first defined here"),
                );
            } else {
                seen.insert(name, child_def.span);
            }
        }
    }
}

/// A node carrying a special-property name must be a property.
fn step4_special_properties(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.kind != DefKind::Property
            && def.kind != DefKind::Schema
            && is_reserved_property_name(&def.name)
        {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                Code(1041),
                def.span,
                format!("the name '{}' belongs to a property", def.name),
            ));
        }
    }
}

/// `abstract` and `final` are mutually exclusive.
fn step5_modifiers(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.modifiers.is_abstract() && def.modifiers.is_final() {
            diags.push(Diagnostic::error(
                DiagKind::BadModifier,
                Code(1051),
                def.span,
                "cannot have 'abstract' and 'final' at the same time",
            ));
        }
    }
}

/// Resolve `implements` properties: expand `all`, bind every argument
/// statically, and check the static-containment rules.
fn step6_implements(state: &mut Loaded, diags: &mut Diagnostics) {
    let props: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| {
            let def = state.arena.def(id);
            def.kind == DefKind::Property && def.name == "implements"
        })
        .collect();

    for prop in props {
        let Some(owner) = state.arena.def(prop).parent else {
            continue;
        };
        let owner_kind = state.arena.def(owner).kind;
        if !state.arena.def(owner).is_structural() {
            diags.push(Diagnostic::error(
                DiagKind::BadImplements,
                Code(1061),
                state.arena.def(prop).span,
                "'implements' can only be used inside fields and fieldsets",
            ));
            continue;
        }

        expand_all(state, prop, owner);

        let good_kinds = KindSet::only(owner_kind);
        let mut resolved = Vec::new();
        for arg_idx in 0..state.arena.def(prop).args.len() {
            let arg = state.arena.def(prop).args[arg_idx].clone();
            let Some(name) = arg.value.as_name() else {
                diags.push(Diagnostic::error(
                    DiagKind::BadImplements,
                    Code(1062),
                    arg.span,
                    format!("only dotted names can be listed after 'implements', not {}", arg.value),
                ));
                continue;
            };
            if name.imp {
                diags.push(Diagnostic::error(
                    DiagKind::BadImplements,
                    Code(1063),
                    arg.span,
                    format!("cannot use imp-name '{}' in 'implements'", name),
                ));
                continue;
            }
            if let Some(explicit) = name.min_classes {
                if explicit != good_kinds {
                    let msg = match owner_kind {
                        DefKind::Field => "fields can only be implemented by fields",
                        _ => "fieldsets can only be implemented by fieldsets",
                    };
                    diags.push(Diagnostic::error(
                        DiagKind::BadImplements,
                        Code(1064),
                        arg.span,
                        msg,
                    ));
                    continue;
                }
            }

            let binder = Binder::new(&state.arena, &state.registry);
            let bound = binder.bind_static(owner, name, good_kinds, None);
            match bound {
                None => {
                    diags.push(Diagnostic::error(
                        DiagKind::UnresolvedName,
                        Code(1065),
                        arg.span,
                        format!("definition '{}' not found", name),
                    ));
                }
                Some(bound) => {
                    let target = bound.target();
                    let path = bound.path.clone();
                    if target == owner {
                        diags.push(Diagnostic::error(
                            DiagKind::BadImplements,
                            Code(1066),
                            arg.span,
                            "nothing can explicitly implement itself",
                        ));
                    } else if state.arena.owns(owner, target) {
                        diags.push(
                            Diagnostic::error(
                                DiagKind::Containment,
                                Code(1067),
                                arg.span,
                                "implementation cannot statically contain its specification",
                            )
                            .with_label(state.arena.def(target).span, "specification here"),
                        );
                    } else if state.arena.owns(target, prop) {
                        diags.push(
                            Diagnostic::error(
                                DiagKind::Containment,
                                Code(1068),
                                arg.span,
                                "specification cannot statically contain its implementation",
                            )
                            .with_label(state.arena.def(target).span, "specification here"),
                        );
                    } else {
                        let slot = &mut state.arena.def_mut(prop).args[arg_idx];
                        slot.resolved = Some(target);
                        slot.resolved_path = Some(path);
                        resolved.push(target);
                    }
                }
            }
        }
        state.arena.def_mut(owner).implements = resolved;
    }
}

/// Replace `all` in an `implements` list with the owner's ancestor names
/// and deduplicate the result by spelling, preserving first-occurrence
/// order.
fn expand_all(state: &mut Loaded, prop: DefId, owner: DefId) {
    let has_all = state
        .arena
        .def(prop)
        .args
        .iter()
        .any(|arg| matches!(arg.value, Value::All));
    if !has_all {
        return;
    }

    let ancestor_names: Vec<crate::ast::Arg> = state
        .arena
        .property_child(owner, "ancestors")
        .map(|anc| state.arena.def(anc).args.clone())
        .unwrap_or_default();

    let prop_span = state.arena.def(prop).span;
    let mut expanded: Vec<crate::ast::Arg> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let mut push = |arg: crate::ast::Arg, seen: &mut Vec<String>, out: &mut Vec<crate::ast::Arg>| {
        let key = match arg.value.as_name() {
            Some(name) => name.dotted(),
            None => arg.value.to_string(),
        };
        if !seen.contains(&key) {
            seen.push(key);
            out.push(arg);
        }
    };

    for arg in state.arena.def(prop).args.clone() {
        if matches!(arg.value, Value::All) {
            for anc in &ancestor_names {
                if let Some(name) = anc.value.as_name() {
                    // `all` refers to the ancestors as written; the
                    // imp prefix is dropped, the no-implements rule for
                    // imp-name ancestors reports the conflict later.
                    let mut plain: DottedName = name.clone();
                    plain.imp = false;
                    let mut new_arg = crate::ast::Arg::new(Value::Name(plain), prop_span);
                    new_arg.span = anc.span;
                    push(new_arg, &mut seen, &mut expanded);
                }
            }
        } else {
            push(arg, &mut seen, &mut expanded);
        }
    }

    state.arena.def_mut(prop).args = expanded;
}

/// The graph induced by `implements` must be acyclic; only the first
/// cycle found is reported.
fn step7_implements_acyclic(state: &mut Loaded, diags: &mut Diagnostics) {
    let mut visited = vec![false; state.arena.len()];
    let mut on_stack = vec![false; state.arena.len()];

    for id in state.arena.ids().collect::<Vec<_>>() {
        if visited[id.0 as usize] {
            continue;
        }
        if let Some(cycle) = cycle_dfs(state, id, &mut visited, &mut on_stack, &mut Vec::new()) {
            let head = cycle[0];
            let chain = cycle
                .iter()
                .map(|&d| state.arena.path(d))
                .collect::<Vec<_>>()
                .join(" -> ");
            diags.push(Diagnostic::error(
                DiagKind::Cycle,
                Code(1071),
                state.arena.def(head).span,
                format!("circular 'implements' chain: {}", chain),
            ));
            return;
        }
    }
}

fn cycle_dfs(
    state: &Loaded,
    id: DefId,
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<DefId>,
) -> Option<Vec<DefId>> {
    visited[id.0 as usize] = true;
    on_stack[id.0 as usize] = true;
    path.push(id);

    for &spec in &state.arena.def(id).implements {
        if !visited[spec.0 as usize] {
            if let Some(cycle) = cycle_dfs(state, spec, visited, on_stack, path) {
                return Some(cycle);
            }
        } else if on_stack[spec.0 as usize] {
            let start = path
                .iter()
                .position(|&d| d == spec)
                .expect("node on stack is on the path");
            let mut cycle = path[start..].to_vec();
            cycle.push(spec);
            return Some(cycle);
        }
    }

    on_stack[id.0 as usize] = false;
    path.pop();
    None
}
