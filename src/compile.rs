//! High-level compile API.
//!
//! Drives phase 0 (loading) and phases 1-8 (resolution), then assembles
//! the [`Compilation`] result object consumed by code generators: the
//! schema registry, the ordered toplevel fieldsets with their member
//! paths, resolved per-field storage attributes, outermost indexes, and
//! the serializable GUID map.

use crate::ast::{Arena, DefId};
use crate::error::{DiagKind, Diagnostic, DiagnosticFormatter, Diagnostics, Severity};
use crate::foundation::{DefKind, KindSet, SortDir, SourceMap};
use crate::loader::{self, Fetcher, FsFetcher};
use crate::registry::Registry;
use crate::resolve::{self, drivers::TypeRegistry};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Compiler configuration.
#[derive(Default)]
pub struct CompileOptions<'a> {
    /// Directories searched for imported schemas, after the importing
    /// file's own directory
    pub search_path: Vec<PathBuf>,
    /// Treat warnings as failures
    pub strict: bool,
    /// Driver type registry for phase 8; `None` skips the phase
    pub types: Option<&'a dyn TypeRegistry>,
}

impl<'a> CompileOptions<'a> {
    /// Options with the current directory on the search path.
    pub fn new() -> Self {
        Self {
            search_path: vec![PathBuf::from(".")],
            strict: false,
            types: None,
        }
    }

    /// Options with the search path extended from the `YASDL_PATH`
    /// environment variable.
    pub fn from_env() -> Self {
        let mut options = Self::new();
        if let Some(paths) = std::env::var_os("YASDL_PATH") {
            options.search_path.extend(std::env::split_paths(&paths));
        }
        options
    }
}

/// Process exit status of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Compiled; warnings and notices permitted
    Success,
    /// At least one semantic error
    SemanticError,
    /// I/O or syntax error
    InputError,
    /// Compiler invariant violation (a bug)
    InternalError,
}

impl ExitStatus {
    /// The conventional process exit code.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::SemanticError => 1,
            ExitStatus::InputError => 2,
            ExitStatus::InternalError => 3,
        }
    }
}

/// A failed compilation: the batched diagnostics and the exit status.
#[derive(Debug)]
pub struct Failure {
    /// Everything reported up to the step that failed
    pub diagnostics: Vec<Diagnostic>,
    /// Derived exit status
    pub status: ExitStatus,
    /// Loaded sources, for rendering diagnostics
    pub sources: SourceMap,
}

impl Failure {
    /// Render the diagnostics with source context.
    pub fn render(&self) -> String {
        DiagnosticFormatter::new(&self.sources).format_all(&self.diagnostics)
    }
}

/// Resolved storage attributes of a realized field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Effective type; `identifier` for referencing fields
    pub type_name: Option<String>,
    /// `size` property
    pub size: Option<i64>,
    /// `precision` property
    pub precision: Option<i64>,
    /// `notnull` property (defaults false)
    pub notnull: bool,
    /// Requirement level (defaults "optional")
    pub reqlevel: String,
    /// Final implementor of the referenced fieldset, when concrete
    pub reference: Option<DefId>,
    /// True for `-> any` fields
    pub universal: bool,
}

/// A check constraint of a fieldset.
#[derive(Debug, Clone)]
pub struct ConstraintInfo {
    /// The constraint definition
    pub def: DefId,
    /// The `check` arguments: strings and resolved field references
    pub check: Vec<crate::ast::Arg>,
}

/// An index of a toplevel fieldset with its resolved field paths.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    /// The index definition
    pub def: DefId,
    /// `unique` property (defaults false)
    pub unique: bool,
    /// One entry per `fields` argument: resolution path and direction
    pub fields: Vec<(Vec<DefId>, SortDir)>,
}

/// A successful compilation.
#[derive(Debug)]
pub struct Compilation {
    /// The fully annotated definition arena
    pub arena: Arena,
    /// All loaded sources
    pub sources: SourceMap,
    /// The schema registry
    pub registry: Registry,
    /// Warnings and notices gathered along the way
    pub diagnostics: Vec<Diagnostic>,
    /// Realized toplevel fieldsets, in load and source order
    pub toplevel_fieldsets: Vec<DefId>,
}

impl Compilation {
    /// Effective type of a field: the `type` property, or `identifier`
    /// for fields referencing a concrete fieldset.
    pub fn field_type(&self, field: DefId) -> Option<String> {
        if self.arena.referenced_fieldset(field).is_some() {
            return Some("identifier".to_string());
        }
        self.arena.prop_str(field, "type").map(str::to_string)
    }

    /// Resolved storage attributes of a field.
    pub fn field_info(&self, field: DefId) -> FieldInfo {
        FieldInfo {
            type_name: self.field_type(field),
            size: self.arena.prop_int(field, "size"),
            precision: self.arena.prop_int(field, "precision"),
            notnull: self.arena.prop_bool(field, "notnull", false),
            reqlevel: self
                .arena
                .prop_str(field, "reqlevel")
                .unwrap_or("optional")
                .to_string(),
            reference: self
                .arena
                .referenced_fieldset(field)
                .map(|target| self.arena.fi(target)),
            universal: self.arena.is_universal_reference(field),
        }
    }

    /// Member paths of every realized field below a fieldset, in member
    /// order.
    pub fn field_paths(&self, fieldset: DefId) -> Vec<Vec<DefId>> {
        self.arena
            .contained_paths(fieldset, KindSet::only(DefKind::Field))
            .filter(|path| {
                self.arena
                    .def(*path.last().expect("non-empty"))
                    .realized
            })
            .collect()
    }

    /// The outermost-level indexes of a fieldset with resolved field
    /// paths.
    pub fn indexes(&self, fieldset: DefId) -> Vec<IndexInfo> {
        self.arena
            .def(fieldset)
            .members
            .values()
            .filter(|&&m| self.arena.def(m).kind == DefKind::Index)
            .map(|&index| IndexInfo {
                def: index,
                unique: self.arena.prop_bool(index, "unique", false),
                fields: self
                    .arena
                    .property_child(index, "fields")
                    .map(|prop| {
                        self.arena
                            .def(prop)
                            .args
                            .iter()
                            .filter_map(|arg| {
                                arg.resolved_path
                                    .clone()
                                    .map(|path| (path, arg.direction))
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// The check constraints of a fieldset with their resolved argument
    /// paths. String arguments pass through verbatim to the DDL emitter.
    pub fn constraints(&self, fieldset: DefId) -> Vec<ConstraintInfo> {
        self.arena
            .def(fieldset)
            .members
            .values()
            .filter(|&&m| self.arena.def(m).kind == DefKind::Constraint)
            .map(|&constraint| ConstraintInfo {
                def: constraint,
                check: self
                    .arena
                    .property_child(constraint, "check")
                    .map(|prop| self.arena.def(prop).args.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Language tag of a schema, defaulted to `"en"`.
    pub fn language(&self, schema: DefId) -> &str {
        self.arena.prop_str(schema, "language").unwrap_or("en")
    }

    /// Serializable map from GUID to definition path, for self-describing
    /// instances.
    pub fn guid_map(&self) -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        for id in self.arena.ids() {
            if self.arena.property_child(id, "guid").is_some() {
                if let Some(guid) = self
                    .arena
                    .property_child(id, "guid")
                    .and_then(|prop| self.arena.def(prop).args.first())
                    .and_then(|arg| arg.value.as_str())
                {
                    map.insert(guid.to_string(), self.arena.path(id));
                }
            }
        }
        map
    }

    /// The GUID map as a JSON string.
    pub fn guid_map_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.guid_map())
    }

    /// Render the retained warnings and notices with source context.
    pub fn render_diagnostics(&self) -> String {
        DiagnosticFormatter::new(&self.sources).format_all(&self.diagnostics)
    }
}

/// Compile a set of top schemas from the filesystem (and HTTP imports).
pub fn compile(tops: &[String], options: &CompileOptions) -> Result<Compilation, Failure> {
    compile_with(tops, &FsFetcher, options)
}

/// Compile with a custom fetcher.
pub fn compile_with(
    tops: &[String],
    fetcher: &dyn Fetcher,
    options: &CompileOptions,
) -> Result<Compilation, Failure> {
    let mut diags = Diagnostics::new();
    let mut state = loader::load(tops, fetcher, &options.search_path, &mut diags);
    resolve::run(&mut state, options.types, &mut diags);

    let failed = diags.has_error() || (options.strict && diags.has_warning());
    if failed {
        let mut status = exit_status(diags.items());
        if status == ExitStatus::Success {
            // Strict mode: warnings alone failed the build.
            status = ExitStatus::SemanticError;
        }
        return Err(Failure {
            diagnostics: diags.into_items(),
            status,
            sources: state.sources,
        });
    }

    let toplevel_fieldsets: Vec<DefId> = state
        .arena
        .ids()
        .filter(|&id| {
            let def = state.arena.def(id);
            def.kind == DefKind::Fieldset && def.toplevel
        })
        .collect();

    Ok(Compilation {
        arena: state.arena,
        sources: state.sources,
        registry: state.registry,
        diagnostics: diags.into_items(),
        toplevel_fieldsets,
    })
}

/// Derive the process exit status from a diagnostic batch.
pub fn exit_status(diagnostics: &[Diagnostic]) -> ExitStatus {
    let mut worst = ExitStatus::Success;
    for diag in diagnostics {
        if diag.severity != Severity::Error {
            continue;
        }
        let status = match diag.kind {
            DiagKind::Internal => ExitStatus::InternalError,
            DiagKind::Syntax | DiagKind::Io => ExitStatus::InputError,
            _ => ExitStatus::SemanticError,
        };
        worst = match (worst, status) {
            (ExitStatus::InternalError, _) | (_, ExitStatus::InternalError) => {
                ExitStatus::InternalError
            }
            (ExitStatus::InputError, _) | (_, ExitStatus::InputError) => ExitStatus::InputError,
            _ => ExitStatus::SemanticError,
        };
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::foundation::Span;

    #[test]
    fn exit_status_ranks_severity() {
        let span = Span::zero(0);
        let semantic = Diagnostic::error(DiagKind::DuplicateName, Code(1031), span, "x");
        let syntax = Diagnostic::error(DiagKind::Syntax, Code(22), span, "x");
        let internal = Diagnostic::error(DiagKind::Internal, Code(9031), span, "x");
        let warning = Diagnostic::warning(DiagKind::BadProperty, Code(7141), span, "x");

        assert_eq!(exit_status(&[warning.clone()]), ExitStatus::Success);
        assert_eq!(exit_status(&[semantic.clone()]), ExitStatus::SemanticError);
        assert_eq!(
            exit_status(&[semantic.clone(), syntax.clone()]),
            ExitStatus::InputError
        );
        assert_eq!(
            exit_status(&[syntax, semantic, internal]),
            ExitStatus::InternalError
        );
        assert_eq!(exit_status(&[]), ExitStatus::Success);
        assert_eq!(ExitStatus::InputError.code(), 2);
    }
}
