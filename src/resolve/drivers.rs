//! Phase 8: driver-specific type checks.
//!
//! An optional collaborator: when the caller supplies a [`TypeRegistry`]
//! (usually backed by a database driver), every realized field's type is
//! checked against it. Without a registry the phase is skipped.

use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::DefKind;
use crate::loader::Loaded;

/// What a driver knows about one type name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeInfo {
    /// The type needs a `size` property (e.g. `char`)
    pub needs_size: bool,
    /// The type needs a `precision` property (e.g. `numeric`)
    pub needs_precision: bool,
    /// The type can hold row identifiers
    pub identifier_compatible: bool,
}

/// Mapping from type name to driver knowledge.
pub trait TypeRegistry {
    /// Look up a type name; `None` means the driver does not support it.
    fn typeinfo(&self, name: &str) -> Option<TypeInfo>;
}

/// The portable baseline type set shared by the bundled drivers.
#[derive(Debug, Default)]
pub struct StandardTypes;

impl TypeRegistry for StandardTypes {
    fn typeinfo(&self, name: &str) -> Option<TypeInfo> {
        Some(match name {
            "char" => TypeInfo {
                needs_size: true,
                ..TypeInfo::default()
            },
            "numeric" => TypeInfo {
                needs_size: true,
                needs_precision: true,
                ..TypeInfo::default()
            },
            "identifier" => TypeInfo {
                identifier_compatible: true,
                ..TypeInfo::default()
            },
            "text" | "integer" | "bigint" | "float" | "boolean" | "date" | "time" | "datetime"
            | "binary" => TypeInfo::default(),
            _ => return None,
        })
    }
}

/// Run phase 8 against a type registry.
pub fn run(state: &mut Loaded, types: &dyn TypeRegistry, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.kind != DefKind::Field || !def.realized {
            continue;
        }
        let type_name = match state.arena.prop_str(id, "type") {
            Some(name) => name.to_string(),
            None if state.arena.referenced_fieldset(id).is_some() => "identifier".to_string(),
            None => continue, // phase 7 already reported the missing type
        };
        let Some(info) = types.typeinfo(&type_name) else {
            diags.push(Diagnostic::error(
                DiagKind::TypeCheck,
                Code(8011),
                def.span,
                format!("type {:?} is not supported by this driver", type_name),
            ));
            continue;
        };
        if info.needs_size && state.arena.prop_int(id, "size").is_none() {
            diags.push(Diagnostic::error(
                DiagKind::TypeCheck,
                Code(8012),
                def.span,
                format!(
                    "field '{}' of type {:?} must have a size",
                    state.arena.path(id),
                    type_name
                ),
            ));
        }
        if info.needs_precision && state.arena.prop_int(id, "precision").is_none() {
            diags.push(Diagnostic::error(
                DiagKind::TypeCheck,
                Code(8013),
                def.span,
                format!(
                    "field '{}' of type {:?} must have a precision",
                    state.arena.path(id),
                    type_name
                ),
            ));
        }
    }
}
