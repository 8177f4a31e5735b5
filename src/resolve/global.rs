//! Phase 7: global property checks.
//!
//! The non-tree-shaped checks that need the fully annotated graph:
//! property shapes and contexts, GUID uniqueness, index realization, and
//! the advisory notices. Unless noted otherwise a check applies to
//! realized definitions only.

use crate::ast::{DefId, Value};
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{DefKind, KindSet};
use crate::loader::Loaded;
use indexmap::IndexMap;

const REFERENTIAL_ACTIONS: [&str; 3] = ["cascade", "setnull", "noaction"];
const REQLEVELS: [&str; 3] = ["optional", "desired", "required"];

/// Run phase 7.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    let checks: [fn(&Loaded, &mut Diagnostics); 15] = [
        check_fieldset_has_fields,
        check_outermost_required_field,
        check_toplevel_nested_spec,
        check_types,
        check_size_precision,
        check_bool_properties,
        check_guids,
        check_referential_actions,
        check_language,
        check_cluster,
        check_reqlevel,
        check_index_realization,
        check_notnull_setnull_conflict,
        check_mandatory_guids,
        check_foreign_key_indexes,
    ];
    for check in checks {
        check(state, diags);
        if diags.has_error() {
            return;
        }
    }
}

fn fieldsets(state: &Loaded) -> impl Iterator<Item = DefId> + '_ {
    state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).kind == DefKind::Fieldset)
}

fn fields(state: &Loaded) -> impl Iterator<Item = DefId> + '_ {
    state
        .arena
        .ids()
        .filter(|&id| state.arena.def(id).kind == DefKind::Field)
}

fn has_realized_field(state: &Loaded, fieldset: DefId) -> bool {
    state
        .arena
        .contained_paths(fieldset, KindSet::only(DefKind::Field))
        .any(|path| state.arena.def(*path.last().expect("non-empty")).realized)
}

/// Realized fieldsets must contain at least one realized field; an error
/// for tables, a warning for embedded fieldsets.
fn check_fieldset_has_fields(state: &Loaded, diags: &mut Diagnostics) {
    for id in fieldsets(state) {
        let def = state.arena.def(id);
        if !def.realized || state.arena.fi(id) != id {
            continue;
        }
        if has_realized_field(state, id) {
            continue;
        }
        if def.toplevel {
            diags.push(Diagnostic::error(
                DiagKind::Realization,
                Code(7011),
                def.span,
                format!(
                    "realized toplevel fieldset '{}' must contain at least one realized field",
                    state.arena.path(id)
                ),
            ));
        } else {
            diags.push(Diagnostic::warning(
                DiagKind::Realization,
                Code(7021),
                def.span,
                format!(
                    "realized fieldset '{}' should contain at least one realized field",
                    state.arena.path(id)
                ),
            ));
        }
    }
}

/// `required` on an outermost field is meaningless.
fn check_outermost_required_field(state: &Loaded, diags: &mut Diagnostics) {
    for id in fields(state) {
        let def = state.arena.def(id);
        if state.arena.is_outermost(id) && def.modifiers.is_required() {
            diags.push(Diagnostic::warning(
                DiagKind::BadModifier,
                Code(7031),
                def.span,
                "outermost field definitions should not be required",
            ));
        }
    }
}

/// A toplevel fieldset with a nested specification risks realizing
/// copies of its contents.
fn check_toplevel_nested_spec(state: &Loaded, diags: &mut Diagnostics) {
    for id in fieldsets(state) {
        let def = state.arena.def(id);
        if !def.realized || !def.toplevel {
            continue;
        }
        for &spec in &def.specifications {
            if !state.arena.is_outermost(spec) {
                diags.push(
                    Diagnostic::notice(
                        DiagKind::Realization,
                        Code(7041),
                        state.arena.def(spec).span,
                        "a toplevel realized fieldset should not have a nested specification \
                         (may realize copies of its contents)",
                    )
                    .with_label(def.span, "realized as a table here"),
                );
            }
        }
    }
}

/// Type property shape, reference/type agreement, and the mandatory type
/// on realized fields.
fn check_types(state: &Loaded, diags: &mut Diagnostics) {
    for id in fields(state) {
        let def = state.arena.def(id);
        let referenced = state.arena.referenced_fieldset(id).is_some();
        let universal = state.arena.is_universal_reference(id);

        if let Some(prop) = state.arena.member(id, "type", KindSet::only(DefKind::Property)) {
            let args = &state.arena.def(prop).args;
            let type_str = args.first().and_then(|arg| arg.value.as_str());
            if args.len() != 1 || type_str.is_none() {
                diags.push(Diagnostic::error(
                    DiagKind::BadProperty,
                    Code(7051),
                    state.arena.def(prop).span,
                    "'type' must have a single string argument",
                ));
                continue;
            }
            if referenced && type_str != Some("identifier") {
                diags.push(Diagnostic::error(
                    DiagKind::BadReference,
                    Code(7052),
                    def.span,
                    "a referencing field must have 'identifier' type",
                ));
            }
            if universal {
                diags.push(Diagnostic::error(
                    DiagKind::BadReference,
                    Code(7053),
                    def.span,
                    "a universal reference must not declare a type",
                ));
            }
        }

        if def.realized && !referenced && !universal && state.arena.prop_str(id, "type").is_none() {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                Code(7054),
                def.span,
                format!("realized field '{}' must have a type", state.arena.path(id)),
            ));
        }
    }
}

fn check_single_int(state: &Loaded, name: &str, code: Code, diags: &mut Diagnostics) {
    for id in fields(state) {
        if let Some(prop) = state.arena.member(id, name, KindSet::only(DefKind::Property)) {
            let args = &state.arena.def(prop).args;
            let ok = args.len() == 1 && matches!(args[0].value, Value::Int(_));
            if !ok {
                diags.push(Diagnostic::error(
                    DiagKind::BadProperty,
                    code,
                    state.arena.def(prop).span,
                    format!("'{}' must have a single integer argument", name),
                ));
            }
        }
    }
}

/// `size` and `precision` take a single integer.
fn check_size_precision(state: &Loaded, diags: &mut Diagnostics) {
    check_single_int(state, "size", Code(7061), diags);
    check_single_int(state, "precision", Code(7071), diags);
}

fn check_bool_in_context(
    state: &Loaded,
    name: &str,
    context: DefKind,
    context_code: Code,
    shape_code: Code,
    diags: &mut Diagnostics,
) {
    for id in state.arena.ids() {
        let def = state.arena.def(id);
        if def.kind == DefKind::Property {
            continue;
        }
        let Some(prop) = state.arena.member(id, name, KindSet::only(DefKind::Property)) else {
            continue;
        };
        if def.kind != context {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                context_code,
                state.arena.def(prop).span,
                format!(
                    "'{}' can only be used inside {} definitions",
                    name,
                    context.name()
                ),
            ));
            continue;
        }
        let args = &state.arena.def(prop).args;
        if args.len() != 1 || !matches!(args[0].value, Value::Bool(_)) {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                shape_code,
                state.arena.def(prop).span,
                format!("'{}' must have a single boolean argument", name),
            ));
        }
    }
}

/// `notnull` lives on fields; `unique` and `immutable` on indexes. All
/// three take a single boolean.
fn check_bool_properties(state: &Loaded, diags: &mut Diagnostics) {
    check_bool_in_context(state, "notnull", DefKind::Field, Code(7081), Code(7082), diags);
    check_bool_in_context(state, "unique", DefKind::Index, Code(7091), Code(7092), diags);
    check_bool_in_context(
        state,
        "immutable",
        DefKind::Index,
        Code(7101),
        Code(7102),
        diags,
    );
}

/// GUID shape and global uniqueness over the definitions carrying one.
fn check_guids(state: &Loaded, diags: &mut Diagnostics) {
    let mut seen: IndexMap<String, DefId> = IndexMap::new();
    for id in state.arena.ids() {
        let Some(prop) = state.arena.property_child(id, "guid") else {
            continue;
        };
        let args = &state.arena.def(prop).args;
        let value = args.first().and_then(|arg| arg.value.as_str());
        match value {
            Some(guid) if args.len() == 1 && !guid.is_empty() => {
                if let Some(&first) = seen.get(guid) {
                    diags.push(
                        Diagnostic::error(
                            DiagKind::Guid,
                            Code(7112),
                            state.arena.def(prop).span,
                            format!("guid {:?} is not unique in the compilation set", guid),
                        )
                        .with_label(state.arena.def(first).span, "also used here"),
                    );
                } else {
                    seen.insert(guid.to_string(), id);
                }
            }
            _ => {
                diags.push(Diagnostic::error(
                    DiagKind::Guid,
                    Code(7111),
                    state.arena.def(prop).span,
                    "'guid' must have a single non-empty string argument",
                ));
            }
        }
    }
}

/// `ondelete`/`onupdate` live on fieldsets and name a referential action.
fn check_referential_actions(state: &Loaded, diags: &mut Diagnostics) {
    for (name, context_code, value_code) in [
        ("ondelete", Code(7121), Code(7123)),
        ("onupdate", Code(7122), Code(7124)),
    ] {
        for id in state.arena.ids() {
            let def = state.arena.def(id);
            if def.kind == DefKind::Property {
                continue;
            }
            let Some(prop) = state.arena.member(id, name, KindSet::only(DefKind::Property)) else {
                continue;
            };
            if def.kind != DefKind::Fieldset {
                diags.push(Diagnostic::error(
                    DiagKind::BadProperty,
                    context_code,
                    state.arena.def(prop).span,
                    format!("'{}' can only be used inside fieldset definitions", name),
                ));
                continue;
            }
            let args = &state.arena.def(prop).args;
            let value = args.first().and_then(|arg| arg.value.as_str());
            let ok = args.len() == 1
                && value.map(|v| REFERENTIAL_ACTIONS.contains(&v)).unwrap_or(false);
            if !ok {
                diags.push(Diagnostic::error(
                    DiagKind::BadProperty,
                    value_code,
                    state.arena.def(prop).span,
                    format!(
                        "the argument of '{}' must be one of {:?}",
                        name, REFERENTIAL_ACTIONS
                    ),
                ));
            }
        }
    }
}

/// `language` is schema-level, a single tag; a missing one defaults to
/// "en" with a warning.
fn check_language(state: &Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids() {
        let def = state.arena.def(id);
        let Some(prop) = state.arena.property_child(id, "language") else {
            continue;
        };
        if def.kind != DefKind::Schema {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                Code(7151),
                state.arena.def(prop).span,
                "'language' can only be defined at schema level",
            ));
            continue;
        }
        let args = &state.arena.def(prop).args;
        if args.len() != 1 || !matches!(args[0].value, Value::Str(_)) {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                Code(7152),
                state.arena.def(prop).span,
                "'language' must have a single string argument",
            ));
        }
    }
    for record in state.registry.iter() {
        if state.arena.property_child(record.def, "language").is_none() {
            diags.push(Diagnostic::warning(
                DiagKind::BadProperty,
                Code(7141),
                state.arena.def(record.def).span,
                format!(
                    "the 'language' property is not defined for schema '{}', assuming \"en\"",
                    record.package
                ),
            ));
        }
    }
}

/// `cluster` is fieldset-level with at most one argument: an index
/// defined at the same level.
fn check_cluster(state: &Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids() {
        let def = state.arena.def(id);
        if def.kind == DefKind::Property {
            continue;
        }
        let Some(prop) = state.arena.member(id, "cluster", KindSet::only(DefKind::Property)) else {
            continue;
        };
        let span = state.arena.def(prop).span;
        if def.kind != DefKind::Fieldset {
            diags.push(Diagnostic::error(
                DiagKind::BadProperty,
                Code(7161),
                span,
                "'cluster' can only be defined at fieldset level",
            ));
            continue;
        }
        let args = &state.arena.def(prop).args;
        match args.len() {
            0 => {} // no clustering
            1 => {
                let target = args[0].resolved;
                let same_level = target
                    .filter(|&t| state.arena.def(t).kind == DefKind::Index)
                    .and_then(|t| state.arena.def(t).parent)
                    .map(|p| state.arena.fi(p) == state.arena.fi(id))
                    .unwrap_or(false);
                if !same_level {
                    diags.push(Diagnostic::error(
                        DiagKind::BadProperty,
                        Code(7163),
                        args[0].span,
                        "the argument of 'cluster' must be an index defined at the same level",
                    ));
                }
            }
            _ => {
                diags.push(Diagnostic::error(
                    DiagKind::BadProperty,
                    Code(7162),
                    span,
                    "'cluster' can only have zero or one argument",
                ));
            }
        }
    }
}

/// `reqlevel` values, and the `required`-without-`notnull` advisory.
fn check_reqlevel(state: &Loaded, diags: &mut Diagnostics) {
    for id in fields(state) {
        let Some(prop) = state.arena.member(id, "reqlevel", KindSet::only(DefKind::Property))
        else {
            continue;
        };
        let args = &state.arena.def(prop).args;
        let value = args.first().and_then(|arg| arg.value.as_str());
        let ok = args.len() == 1 && value.map(|v| REQLEVELS.contains(&v)).unwrap_or(false);
        if !ok {
            diags.push(Diagnostic::notice(
                DiagKind::BadProperty,
                Code(7171),
                state.arena.def(prop).span,
                format!("the argument of 'reqlevel' should be one of {:?}", REQLEVELS),
            ));
            continue;
        }
        if value == Some("required") && !state.arena.prop_bool(id, "notnull", false) {
            diags.push(Diagnostic::notice(
                DiagKind::BadProperty,
                Code(7172),
                state.arena.def(prop).span,
                "required fields should also be 'notnull true'",
            ));
        }
    }
}

/// Indexes of a realized final fieldset must index realized fields.
fn check_index_realization(state: &Loaded, diags: &mut Diagnostics) {
    for id in fieldsets(state) {
        let def = state.arena.def(id);
        if !def.realized || state.arena.fi(id) != id {
            continue;
        }
        for &member in def.members.values() {
            if state.arena.def(member).kind != DefKind::Index {
                continue;
            }
            let Some(fields_prop) = state.arena.property_child(member, "fields") else {
                continue;
            };
            for arg in &state.arena.def(fields_prop).args {
                let Some(target) = arg.resolved else { continue };
                if !state.arena.def(target).realized {
                    diags.push(
                        Diagnostic::error(
                            DiagKind::BadIndex,
                            Code(7131),
                            arg.span,
                            "index belongs to a realized final implementation but its field \
                             is not realized",
                        )
                        .with_label(state.arena.def(target).span, "unrealized field here"),
                    );
                }
            }
        }
    }
}

/// A `notnull true` field must not reference a fieldset whose rows are
/// removed with `setnull` semantics.
fn check_notnull_setnull_conflict(state: &Loaded, diags: &mut Diagnostics) {
    for id in fields(state) {
        let def = state.arena.def(id);
        if !def.realized || !state.arena.prop_bool(id, "notnull", false) {
            continue;
        }
        let Some(target) = state.arena.referenced_fieldset(id) else {
            continue;
        };
        let fi = state.arena.fi(target);
        for action in ["ondelete", "onupdate"] {
            if state.arena.prop_str(fi, action) == Some("setnull") {
                diags.push(
                    Diagnostic::error(
                        DiagKind::BadProperty,
                        Code(7181),
                        def.span,
                        format!(
                            "must not combine 'notnull true' with '{} \"setnull\"' on the \
                             referenced fieldset",
                            action
                        ),
                    )
                    .with_label(state.arena.def(fi).span, "referenced fieldset here"),
                );
            }
        }
    }
}

/// Schemas and self-realized toplevel fieldsets must carry a GUID.
fn check_mandatory_guids(state: &Loaded, diags: &mut Diagnostics) {
    for record in state.registry.iter() {
        if state.arena.prop_str(record.def, "guid").is_none() {
            diags.push(Diagnostic::error(
                DiagKind::Guid,
                Code(7191),
                state.arena.def(record.def).span,
                format!("schema '{}' must have a guid property", record.package),
            ));
        }
    }
    for id in fieldsets(state) {
        let def = state.arena.def(id);
        if def.realized
            && def.toplevel
            && state.arena.fi(id) == id
            && state.arena.prop_str(id, "guid").is_none()
        {
            diags.push(Diagnostic::error(
                DiagKind::Guid,
                Code(7192),
                def.span,
                format!(
                    "self-realized toplevel fieldset '{}' must have a guid property",
                    state.arena.path(id)
                ),
            ));
        }
    }
}

/// A realized foreign key without a covering index earns a notice unless
/// the field opts out with `need_index false`.
fn check_foreign_key_indexes(state: &Loaded, diags: &mut Diagnostics) {
    for id in fieldsets(state) {
        let def = state.arena.def(id);
        if !def.realized || state.arena.fi(id) != id {
            continue;
        }
        let indexed: Vec<DefId> = def
            .members
            .values()
            .filter(|&&m| state.arena.def(m).kind == DefKind::Index)
            .filter_map(|&m| state.arena.property_child(m, "fields"))
            .flat_map(|f| state.arena.def(f).args.iter().filter_map(|a| a.resolved))
            .collect();
        let field_paths: Vec<Vec<DefId>> = state
            .arena
            .contained_paths(id, KindSet::only(DefKind::Field))
            .collect();
        for path in field_paths {
            let field = *path.last().expect("non-empty");
            if !state.arena.def(field).realized
                || state.arena.referenced_fieldset(field).is_none()
            {
                continue;
            }
            if state.arena.prop_bool(field, "need_index", true) && !indexed.contains(&field) {
                diags.push(Diagnostic::notice(
                    DiagKind::BadIndex,
                    Code(7201),
                    state.arena.def(field).span,
                    format!(
                        "foreign key '{}' has no covering index (silence with 'need_index \
                         false')",
                        state.arena.path(field)
                    ),
                ));
            }
        }
    }
}
