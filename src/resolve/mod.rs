//! The resolution pipeline: phases 1 through 8.
//!
//! ```text
//! Load (0) → Local checks (1) → Implementation trees (2) →
//!     ^^^^^^      ^^^^^              ^^^^^^^^^^^^^^
//!    loader       local              implementation
//!
//! → Inheritance + members (3) → Name binding (4) → Realization (5) →
//!        ^^^^^^^^^^^                ^^^^^^^^^          ^^^^^^^^^^^
//!        inheritance               properties          realization
//!
//! → Requirements (6) → Global checks (7) → Driver checks (8, optional)
//!        ^^^^^^^^^^        ^^^^^^              ^^^^^^^
//!      requirements        global              drivers
//! ```
//!
//! Control flow is strictly linear. Each phase reads the fully annotated
//! state left by the previous one and writes new fields onto arena nodes;
//! nothing is ever retracted. A phase step reports every violation it
//! finds, and the first step that produced an error ends the pipeline.

pub mod binder;
pub mod drivers;
pub mod global;
pub mod implementation;
pub mod inheritance;
pub mod local;
pub mod properties;
pub mod realization;
pub mod requirements;

use crate::error::Diagnostics;
use crate::loader::Loaded;
use drivers::TypeRegistry;
use tracing::debug;

/// Run phases 1-8 over loaded state.
///
/// Assumes phase 0 succeeded; returns immediately when `diags` already
/// holds an error. Warnings and notices never stop the pipeline.
pub fn run(state: &mut Loaded, types: Option<&dyn TypeRegistry>, diags: &mut Diagnostics) {
    if diags.has_error() {
        return;
    }
    let phases: [(&str, fn(&mut Loaded, &mut Diagnostics)); 7] = [
        ("local", local::run),
        ("implementation", implementation::run),
        ("inheritance", inheritance::run),
        ("properties", properties::run),
        ("realization", realization::run),
        ("requirements", requirements::run),
        ("global", global::run),
    ];
    for (name, phase) in phases {
        debug!(phase = name, "running");
        phase(state, diags);
        if diags.has_error() {
            debug!(phase = name, errors = diags.error_count(), "stopped");
            return;
        }
    }
    if let Some(types) = types {
        debug!(phase = "drivers", "running");
        drivers::run(state, types, diags);
    }
}
