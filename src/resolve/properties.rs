//! Phase 4: binding the remaining names.
//!
//! Everything except `ancestors` and `implements` binds dynamically:
//! member tables first, static children dereferenced to final
//! implementors second, acquisition through the static parent chain last.
//! The phase also validates the arguments of `references`, `index` and
//! `constraint` definitions.

use crate::ast::{DefId, Value};
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{DefKind, KindSet};
use crate::loader::Loaded;
use crate::resolve::binder::Binder;

/// Run phase 4.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    step1_reference_shape(state, diags);
    if diags.has_error() {
        return;
    }
    step2_bind_names(state, diags);
    if diags.has_error() {
        return;
    }
    step3_reference_targets(state, diags);
    if diags.has_error() {
        return;
    }
    step4_indexes(state, diags);
    if diags.has_error() {
        return;
    }
    step5_constraints(state, diags);
}

fn properties_named(state: &Loaded, name: &str) -> Vec<DefId> {
    state
        .arena
        .ids()
        .filter(|&id| {
            let def = state.arena.def(id);
            def.kind == DefKind::Property && def.name == name
        })
        .collect()
}

/// `references` takes zero or one argument: a fieldset name or the
/// universal marker `any`, and only appears on fields.
fn step1_reference_shape(state: &mut Loaded, diags: &mut Diagnostics) {
    for prop in properties_named(state, "references") {
        let span = state.arena.def(prop).span;
        let owner_is_field = state
            .arena
            .def(prop)
            .parent
            .map(|p| state.arena.def(p).kind == DefKind::Field)
            .unwrap_or(false);
        if !owner_is_field {
            diags.push(Diagnostic::error(
                DiagKind::BadReference,
                Code(4011),
                span,
                "'references' can only be used inside field definitions",
            ));
            continue;
        }
        let args = &state.arena.def(prop).args;
        if args.len() > 1 {
            diags.push(Diagnostic::error(
                DiagKind::BadReference,
                Code(4012),
                span,
                "'references' cannot have more than one argument",
            ));
            continue;
        }
        let Some(arg) = args.first() else {
            continue; // zero arguments: removes an inherited reference
        };
        match &arg.value {
            Value::Any => {}
            Value::Name(name) => {
                if let Some(explicit) = name.min_classes {
                    if explicit != KindSet::only(DefKind::Fieldset) {
                        diags.push(Diagnostic::error(
                            DiagKind::BadReference,
                            Code(4013),
                            arg.span,
                            "only fieldsets can be referenced",
                        ));
                    }
                }
            }
            other => {
                diags.push(Diagnostic::error(
                    DiagKind::BadReference,
                    Code(4014),
                    arg.span,
                    format!("the argument of 'references' must be a fieldset, not {}", other),
                ));
            }
        }
    }
}

/// Bind every dotted name in every property except `implements` and
/// `ancestors`.
fn step2_bind_names(state: &mut Loaded, diags: &mut Diagnostics) {
    let props: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| {
            let def = state.arena.def(id);
            def.kind == DefKind::Property && def.name != "implements" && def.name != "ancestors"
        })
        .collect();

    for prop in props {
        let default_kinds = match state.arena.def(prop).name.as_str() {
            "references" => KindSet::only(DefKind::Fieldset),
            _ => KindSet::any(),
        };
        for arg_idx in 0..state.arena.def(prop).args.len() {
            let arg = state.arena.def(prop).args[arg_idx].clone();
            let Some(name) = arg.value.as_name() else {
                continue;
            };
            let kinds = Binder::effective_kinds(name, default_kinds);
            let binder = Binder::new(&state.arena, &state.registry);
            match binder.bind_dynamic(prop, name, kinds) {
                Some(bound) => {
                    if bound.via_package_name {
                        diags.push(Diagnostic::warning(
                            DiagKind::BadProperty,
                            Code(4021),
                            arg.span,
                            "absolute name used to access an object inside the same schema \
                             (use 'schema.<name>' instead)",
                        ));
                    }
                    let target = bound.target();
                    let path = bound.path;
                    let slot = &mut state.arena.def_mut(prop).args[arg_idx];
                    slot.resolved = Some(target);
                    slot.resolved_path = Some(path);
                }
                None => {
                    diags.push(Diagnostic::error(
                        DiagKind::UnresolvedName,
                        Code(4022),
                        arg.span,
                        format!("definition '{}' not found", name),
                    ));
                }
            }
        }
    }
}

/// A concrete reference target must resolve to an outermost fieldset that
/// does not enclose the referencing field.
fn step3_reference_targets(state: &mut Loaded, diags: &mut Diagnostics) {
    for prop in properties_named(state, "references") {
        let Some(field) = state.arena.def(prop).parent else {
            continue;
        };
        let Some(arg) = state.arena.def(prop).args.first() else {
            continue;
        };
        let Some(target) = arg.resolved else {
            continue;
        };
        let arg_span = arg.span;
        let fi = state.arena.fi(target);
        if !state.arena.is_outermost(fi) {
            diags.push(
                Diagnostic::error(
                    DiagKind::BadReference,
                    Code(4031),
                    arg_span,
                    "trying to reference a non-outermost fieldset",
                )
                .with_label(state.arena.def(fi).span, "resolved target here"),
            );
        } else if state.arena.owns(fi, field) {
            diags.push(Diagnostic::error(
                DiagKind::BadReference,
                Code(4032),
                arg_span,
                "a field cannot reference its enclosing fieldset",
            ));
        }
    }
}

/// Index definitions: a `fields` property with at least one argument, all
/// arguments fields or fieldsets contained in the enclosing fieldset, no
/// duplicates.
fn step4_indexes(state: &mut Loaded, diags: &mut Diagnostics) {
    let indexes: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).kind == DefKind::Index)
        .collect();

    for index in indexes {
        let span = state.arena.def(index).span;
        let Some(fields) = state.arena.property_child(index, "fields") else {
            diags.push(Diagnostic::error(
                DiagKind::BadIndex,
                Code(4041),
                span,
                "an index must specify its fields",
            ));
            continue;
        };
        if state.arena.def(fields).args.is_empty() {
            diags.push(Diagnostic::error(
                DiagKind::BadIndex,
                Code(4042),
                state.arena.def(fields).span,
                "an index must have at least one field",
            ));
            continue;
        }
        let Some(owner) = state.arena.def(index).parent else {
            continue;
        };

        let mut ok = true;
        for arg in state.arena.def(fields).args.clone() {
            let structural = arg
                .resolved
                .map(|r| state.arena.def(r).is_structural())
                .unwrap_or(false);
            if !structural {
                diags.push(Diagnostic::error(
                    DiagKind::BadIndex,
                    Code(4043),
                    arg.span,
                    "arguments of 'fields' must be fields or fieldsets",
                ));
                ok = false;
                continue;
            }
            let target = arg.resolved.expect("checked above");
            if !state.arena.contains(owner, target) {
                diags.push(
                    Diagnostic::error(
                        DiagKind::BadIndex,
                        Code(4044),
                        arg.span,
                        "trying to index on a field that is not contained in the fieldset",
                    )
                    .with_label(state.arena.def(target).span, "resolved target here"),
                );
                ok = false;
            }
        }
        if !ok {
            continue;
        }

        let mut seen: Vec<DefId> = Vec::new();
        for arg in state.arena.def(fields).args.clone() {
            let target = arg.resolved.expect("validated above");
            if seen.contains(&target) {
                diags.push(Diagnostic::error(
                    DiagKind::BadIndex,
                    Code(4045),
                    arg.span,
                    "duplicate field in index definition",
                ));
            } else {
                seen.push(target);
            }
        }
    }
}

/// Constraint definitions: a `check` property with at least one string or
/// field argument; field arguments must be contained in the enclosing
/// fieldset.
fn step5_constraints(state: &mut Loaded, diags: &mut Diagnostics) {
    let constraints: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).kind == DefKind::Constraint)
        .collect();

    for constraint in constraints {
        let span = state.arena.def(constraint).span;
        let Some(check) = state.arena.property_child(constraint, "check") else {
            diags.push(Diagnostic::error(
                DiagKind::BadConstraint,
                Code(4051),
                span,
                "a constraint must specify its check condition",
            ));
            continue;
        };
        if state.arena.def(check).args.is_empty() {
            diags.push(Diagnostic::error(
                DiagKind::BadConstraint,
                Code(4052),
                state.arena.def(check).span,
                "empty check condition",
            ));
            continue;
        }
        let Some(owner) = state.arena.def(constraint).parent else {
            continue;
        };
        for arg in state.arena.def(check).args.clone() {
            match &arg.value {
                Value::Str(_) => {}
                Value::Name(_) => {
                    let is_field = arg
                        .resolved
                        .map(|r| state.arena.def(r).kind == DefKind::Field)
                        .unwrap_or(false);
                    if !is_field {
                        diags.push(Diagnostic::error(
                            DiagKind::BadConstraint,
                            Code(4053),
                            arg.span,
                            "arguments of 'check' must be strings or fields",
                        ));
                        continue;
                    }
                    let target = arg.resolved.expect("checked above");
                    if !state.arena.contains(owner, target) {
                        diags.push(Diagnostic::error(
                            DiagKind::BadConstraint,
                            Code(4054),
                            arg.span,
                            "check constraints can only use fields contained in the fieldset",
                        ));
                    }
                }
                other => {
                    diags.push(Diagnostic::error(
                        DiagKind::BadConstraint,
                        Code(4053),
                        arg.span,
                        format!("arguments of 'check' must be strings or fields, not {}", other),
                    ));
                }
            }
        }
    }
}
