//! Phase 6: required members of realized specifications.
//!
//! For every realized final fieldset, every definition in its
//! implementation tree is a contract: a `required` member of a
//! specification must end up realized in the final implementation.
//! The common failure modes are a member hidden by a later ancestor and
//! a member removed with `delete`.

use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::DefKind;
use crate::loader::Loaded;

/// Run phase 6.
pub fn run(state: &mut Loaded, diags: &mut Diagnostics) {
    for id in state.arena.ids().collect::<Vec<_>>() {
        let def = state.arena.def(id);
        if def.kind != DefKind::Fieldset || !def.realized || state.arena.fi(id) != id {
            continue;
        }
        for spec in state.arena.def(id).specifications.clone() {
            for child in state.arena.def(spec).children.clone() {
                let member = state.arena.def(child);
                if !member.is_structural() || !member.modifiers.is_required() {
                    continue;
                }
                if !member.realized {
                    diags.push(
                        Diagnostic::error(
                            DiagKind::RequirementUnmet,
                            Code(6011),
                            member.span,
                            format!(
                                "required definition '{}' is not realized",
                                state.arena.path(child)
                            ),
                        )
                        .with_label(state.arena.def(spec).span, "specification of the owner")
                        .with_label(state.arena.def(id).span, "realization of the owner"),
                    );
                }
            }
        }
    }
}
