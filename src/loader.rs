//! Phase 0: loading and the import graph.
//!
//! Resolves `use`/`require` statements, fetches sources by local path or
//! URI, parses them, and canonicalizes identities so that two origins
//! naming the same source load once. Cycles at the import level are
//! permitted; the built-in `venus` schema is implicitly required by every
//! top schema.
//!
//! Post-load checks:
//! - a locally loaded schema's declared package name must match the
//!   dotted path used to reach it,
//! - a URI-loaded schema's package name must start with the reverse-DNS
//!   of its host (`www.` optional),
//! - no two loaded schemas share a package name.
//!
//! Syntax and I/O failures are fatal; everything else is collected and
//! reported in batch, per the compiler's failure policy.

use crate::ast::{Arena, DefId, Import, ImportTarget};
use crate::error::{Code, DiagKind, Diagnostic, Diagnostics};
use crate::foundation::{SourceMap, Span};
use crate::lexer;
use crate::parser;
use crate::registry::{Registry, SchemaRecord};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Origin of the embedded `venus` core schema.
pub const VENUS_ORIGIN: &str = "builtin:venus";

/// Package name of the built-in schema.
pub const VENUS_PACKAGE: &str = "venus";

const VENUS_SOURCE: &str = include_str!("../schemas/venus.yasdl");

/// Failure of a locate or fetch operation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Filesystem failure
    #[error("cannot read {origin}: {source}")]
    Io {
        /// Origin being read
        origin: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// HTTP transport or status failure
    #[error("cannot fetch {origin}: {message}")]
    Http {
        /// Origin being fetched
        origin: String,
        /// Transport error or status line
        message: String,
    },
    /// URI scheme the fetcher does not implement
    #[error("unsupported scheme in {0}")]
    UnsupportedScheme(String),
}

/// Source access used by the loader.
///
/// The bundled [`FsFetcher`] reads local files and `http`/`https` URIs;
/// tests use in-memory fetchers. Implementations decide how dotted
/// package names map to origins, so the loader never touches the
/// filesystem directly.
pub trait Fetcher {
    /// Resolve a dotted package name against a search path, returning the
    /// canonical origin, or `None` when the package cannot be located.
    fn locate(&self, package: &str, search_path: &[PathBuf]) -> Option<String>;

    /// Fetch the contents of a canonical origin.
    fn fetch(&self, origin: &str) -> Result<String, FetchError>;

    /// Canonicalize a top-schema origin as given on the command line.
    fn canonicalize(&self, origin: &str) -> Result<String, FetchError>;

    /// Check a locally loaded schema's declared package name against the
    /// origin it was reached by.
    fn declared_package_ok(&self, origin: &str, package: &str) -> bool {
        let suffix: PathBuf = package.split('.').collect::<PathBuf>().with_extension("yasdl");
        Path::new(origin).ends_with(&suffix)
    }
}

/// Filesystem and HTTP fetcher.
///
/// Dotted names map to files: each non-final segment is a directory, the
/// final segment a `.yasdl` file, searched along the search path.
/// Canonical identity is the absolute path with symlinks resolved. URIs
/// are fetched with ureq, without authentication; their canonical
/// identity is the URI string itself. `ftp` is recognized but not
/// implemented by this fetcher.
#[derive(Debug, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn locate(&self, package: &str, search_path: &[PathBuf]) -> Option<String> {
        let relative: PathBuf = package.split('.').collect::<PathBuf>().with_extension("yasdl");
        for dir in search_path {
            let candidate = dir.join(&relative);
            if candidate.is_file() {
                let canonical = std::fs::canonicalize(&candidate).unwrap_or(candidate);
                return Some(canonical.to_string_lossy().into_owned());
            }
        }
        None
    }

    fn fetch(&self, origin: &str) -> Result<String, FetchError> {
        if let Some(scheme) = uri_scheme(origin) {
            return match scheme {
                "http" | "https" => ureq::get(origin)
                    .call()
                    .map_err(|e| FetchError::Http {
                        origin: origin.to_string(),
                        message: e.to_string(),
                    })?
                    .into_string()
                    .map_err(|e| FetchError::Http {
                        origin: origin.to_string(),
                        message: e.to_string(),
                    }),
                _ => Err(FetchError::UnsupportedScheme(origin.to_string())),
            };
        }
        std::fs::read_to_string(origin).map_err(|source| FetchError::Io {
            origin: origin.to_string(),
            source,
        })
    }

    fn canonicalize(&self, origin: &str) -> Result<String, FetchError> {
        if uri_scheme(origin).is_some() {
            return Ok(origin.to_string());
        }
        std::fs::canonicalize(origin)
            .map(|p| p.to_string_lossy().into_owned())
            .map_err(|source| FetchError::Io {
                origin: origin.to_string(),
                source,
            })
    }
}

/// In-memory fetcher keyed by dotted package name.
///
/// Origins take the form `mem:<package>`. Used by the test suites; kept
/// in the library so downstream crates can compile schema sets they
/// assemble programmatically.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    sources: Vec<(String, String)>,
}

impl MemoryFetcher {
    /// Create an empty in-memory fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema source under a dotted package name.
    pub fn add(&mut self, package: &str, source: &str) -> &mut Self {
        self.sources.push((package.to_string(), source.to_string()));
        self
    }

    fn origin_of(package: &str) -> String {
        format!("mem:{}", package)
    }
}

impl Fetcher for MemoryFetcher {
    fn locate(&self, package: &str, _search_path: &[PathBuf]) -> Option<String> {
        self.sources
            .iter()
            .any(|(p, _)| p == package)
            .then(|| Self::origin_of(package))
    }

    fn fetch(&self, origin: &str) -> Result<String, FetchError> {
        let package = origin.strip_prefix("mem:").unwrap_or(origin);
        self.sources
            .iter()
            .find(|(p, _)| p == package)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| FetchError::Io {
                origin: origin.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such source"),
            })
    }

    fn canonicalize(&self, origin: &str) -> Result<String, FetchError> {
        if origin.starts_with("mem:") {
            Ok(origin.to_string())
        } else {
            Ok(Self::origin_of(origin))
        }
    }

    fn declared_package_ok(&self, origin: &str, package: &str) -> bool {
        origin.strip_prefix("mem:") == Some(package)
    }
}

/// Everything phase 0 produces.
#[derive(Debug, Default)]
pub struct Loaded {
    /// The shared definition arena
    pub arena: Arena,
    /// All loaded sources
    pub sources: SourceMap,
    /// The schema registry
    pub registry: Registry,
}

/// Load the transitive closure of a set of top-schema origins.
///
/// Collects diagnostics into `diags`; on a fatal failure (syntax or I/O)
/// the partial result is still returned so diagnostics can quote sources,
/// but the caller must not run later phases when `diags.has_error()`.
pub fn load(
    tops: &[String],
    fetcher: &dyn Fetcher,
    search_path: &[PathBuf],
    diags: &mut Diagnostics,
) -> Loaded {
    let mut loaded = Loaded::default();
    let mut queue: VecDeque<PendingLoad> = VecDeque::new();

    // The built-in schema is loaded up front; every top schema requires it.
    load_source(VENUS_ORIGIN, VENUS_SOURCE.to_string(), &mut loaded, diags);

    for top in tops {
        match fetcher.canonicalize(top) {
            Ok(origin) => queue.push_back(PendingLoad {
                origin,
                is_top: true,
                import_span: None,
            }),
            Err(err) => diags.push(Diagnostic::error(
                DiagKind::Io,
                Code(11),
                Span::zero(0),
                err.to_string(),
            )),
        }
    }

    while let Some(pending) = queue.pop_front() {
        if diags.has_error() {
            // Syntax and I/O failures are fatal; stop loading.
            break;
        }
        if loaded.registry.contains_origin(&pending.origin) {
            if pending.is_top {
                if let Some(record) = loaded.registry.by_origin(&pending.origin) {
                    let def = record.def;
                    mark_top(&mut loaded, def);
                }
            }
            continue;
        }
        debug!(origin = %pending.origin, "loading schema");
        let source = match fetcher.fetch(&pending.origin) {
            Ok(source) => source,
            Err(err) => {
                diags.push(Diagnostic::error(
                    DiagKind::Io,
                    Code(12),
                    pending.import_span.unwrap_or_else(|| Span::zero(0)),
                    err.to_string(),
                ));
                continue;
            }
        };
        let Some(def) = load_source(&pending.origin, source, &mut loaded, diags) else {
            continue;
        };
        if pending.is_top {
            mark_top(&mut loaded, def);
        }
        resolve_imports(def, fetcher, search_path, &mut loaded, &mut queue, diags);
    }

    if !diags.has_error() {
        check_packages(fetcher, &mut loaded, diags);
    }
    loaded
}

struct PendingLoad {
    origin: String,
    is_top: bool,
    import_span: Option<Span>,
}

/// Parse one source and register its schema. Returns the schema def.
fn load_source(
    origin: &str,
    source: String,
    loaded: &mut Loaded,
    diags: &mut Diagnostics,
) -> Option<DefId> {
    let tokens = lexer::tokenize(&source);
    let file_id = loaded.sources.add_source(origin.to_string(), source);

    let tokens = match tokens {
        Ok(tokens) => tokens,
        Err(err) => {
            let span = Span::new(file_id, err.span.start as u32, err.span.end as u32, 0);
            diags.push(Diagnostic::error(DiagKind::Syntax, Code(21), span, err.to_string()));
            return None;
        }
    };
    let parsed = match parser::parse_schema(&tokens, file_id, &mut loaded.arena) {
        Ok(parsed) => parsed,
        Err(err) => {
            diags.push(Diagnostic::error(
                DiagKind::Syntax,
                Code(22),
                err.span,
                err.message,
            ));
            return None;
        }
    };

    let dir = Path::new(origin)
        .parent()
        .filter(|_| uri_scheme(origin).is_none() && !origin.contains(':'))
        .map(Path::to_path_buf);

    loaded.registry.add(SchemaRecord {
        def: parsed.root,
        package: parsed.package,
        origin: origin.to_string(),
        file_id,
        imports: parsed.imports,
        dir,
        is_top: false,
        realized: false,
    });
    Some(parsed.root)
}

/// Mark a schema as a top schema and add the implicit `venus` require.
fn mark_top(loaded: &mut Loaded, def: DefId) {
    let venus_def = loaded
        .registry
        .by_origin(VENUS_ORIGIN)
        .map(|record| record.def);
    let Some(record) = loaded.registry.by_def_mut(def) else {
        return;
    };
    record.is_top = true;
    if record.origin == VENUS_ORIGIN {
        return;
    }
    let already_imported = record
        .imports
        .iter()
        .any(|import| import.target == ImportTarget::Package(VENUS_PACKAGE.to_string()));
    if !already_imported {
        let span = Span::zero(record.file_id);
        record.imports.push(Import {
            target: ImportTarget::Package(VENUS_PACKAGE.to_string()),
            alias: None,
            required: true,
            implicit: true,
            span,
            origin: Some(VENUS_ORIGIN.to_string()),
            resolved: venus_def,
        });
    }
}

/// Resolve the imports of a freshly loaded schema and queue the targets.
fn resolve_imports(
    def: DefId,
    fetcher: &dyn Fetcher,
    search_path: &[PathBuf],
    loaded: &mut Loaded,
    queue: &mut VecDeque<PendingLoad>,
    diags: &mut Diagnostics,
) {
    let Some(record) = loaded.registry.by_def(def) else {
        return;
    };
    // The importing file's directory heads the search path, then the
    // configured entries.
    let mut local_path: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &record.dir {
        local_path.push(dir.clone());
    }
    local_path.extend(search_path.iter().cloned());

    let mut resolutions: Vec<(usize, Option<String>)> = Vec::new();
    for (idx, import) in record.imports.iter().enumerate() {
        match &import.target {
            ImportTarget::Package(package) => {
                if package.contains('.') && import.alias.is_none() {
                    diags.push(Diagnostic::error(
                        DiagKind::BadImport,
                        Code(31),
                        import.span,
                        format!("import of '{}' needs an alias ('as <name>')", package),
                    ));
                    resolutions.push((idx, None));
                    continue;
                }
                if package == VENUS_PACKAGE {
                    resolutions.push((idx, Some(VENUS_ORIGIN.to_string())));
                    continue;
                }
                match fetcher.locate(package, &local_path) {
                    Some(origin) => resolutions.push((idx, Some(origin))),
                    None => {
                        diags.push(Diagnostic::error(
                            DiagKind::BadImport,
                            Code(32),
                            import.span,
                            format!(
                                "schema '{}' cannot be located (search path: {:?})",
                                package, local_path
                            ),
                        ));
                        resolutions.push((idx, None));
                    }
                }
            }
            ImportTarget::Uri(uri) => {
                if import.alias.is_none() {
                    diags.push(Diagnostic::error(
                        DiagKind::BadImport,
                        Code(33),
                        import.span,
                        "URI imports need an alias ('as <name>')",
                    ));
                    resolutions.push((idx, None));
                    continue;
                }
                match uri_scheme(uri) {
                    Some("http") | Some("https") | Some("ftp") => {
                        resolutions.push((idx, Some(uri.clone())));
                    }
                    _ => {
                        diags.push(Diagnostic::error(
                            DiagKind::BadImport,
                            Code(34),
                            import.span,
                            format!("unsupported URI scheme in {:?}", uri),
                        ));
                        resolutions.push((idx, None));
                    }
                }
            }
        }
    }

    let Some(record) = loaded.registry.by_def_mut(def) else {
        return;
    };
    for (idx, origin) in resolutions {
        if let Some(origin) = origin {
            let span = record.imports[idx].span;
            record.imports[idx].origin = Some(origin.clone());
            queue.push_back(PendingLoad {
                origin,
                is_top: false,
                import_span: Some(span),
            });
        }
    }
}

/// Post-load package checks and import back-patching.
fn check_packages(fetcher: &dyn Fetcher, loaded: &mut Loaded, diags: &mut Diagnostics) {
    // Patch import targets to their loaded schema definitions.
    let mut patches: Vec<(DefId, usize, Option<DefId>)> = Vec::new();
    for record in loaded.registry.iter() {
        for (idx, import) in record.imports.iter().enumerate() {
            let target = import
                .origin
                .as_deref()
                .and_then(|origin| loaded.registry.by_origin(origin))
                .map(|target| target.def);
            patches.push((record.def, idx, target));
        }
    }
    for (def, idx, target) in patches {
        if let Some(record) = loaded.registry.by_def_mut(def) {
            record.imports[idx].resolved = target;
        }
    }

    // Declared package names must match the names used to reach them.
    let mut package_errors: Vec<Diagnostic> = Vec::new();
    for record in loaded.registry.iter() {
        for import in &record.imports {
            let Some(target) = import.resolved.and_then(|d| loaded.registry.by_def(d)) else {
                continue;
            };
            if let ImportTarget::Package(expected) = &import.target {
                if &target.package != expected {
                    package_errors.push(
                        Diagnostic::error(
                            DiagKind::BadPackage,
                            Code(41),
                            import.span,
                            format!(
                                "invalid package name: '{}' is referenced as '{}'",
                                target.package, expected
                            ),
                        )
                        .with_label(
                            span_of_schema(loaded, target.def),
                            "declared here",
                        ),
                    );
                }
            }
        }
    }

    for record in loaded.registry.iter() {
        let span = span_of_schema(loaded, record.def);
        if record.origin == VENUS_ORIGIN {
            continue;
        }
        if let Some(host) = uri_host(&record.origin) {
            let reverse = reverse_dns(host);
            let matches = record.package == reverse
                || record.package.starts_with(&format!("{}.", reverse));
            if !matches {
                package_errors.push(Diagnostic::error(
                    DiagKind::BadPackage,
                    Code(42),
                    span,
                    format!(
                        "package '{}' loaded from {:?} must start with '{}'",
                        record.package, record.origin, reverse
                    ),
                ));
            }
        } else if record.is_top && !fetcher.declared_package_ok(&record.origin, &record.package) {
            package_errors.push(Diagnostic::error(
                DiagKind::BadPackage,
                Code(43),
                span,
                format!(
                    "declared package name '{}' does not match its location {:?}",
                    record.package, record.origin
                ),
            ));
        }
    }

    // Package names are globally unique.
    let mut seen: indexmap::IndexMap<&str, &SchemaRecord> = indexmap::IndexMap::new();
    for record in loaded.registry.iter() {
        if let Some(first) = seen.get(record.package.as_str()) {
            package_errors.push(
                Diagnostic::error(
                    DiagKind::BadPackage,
                    Code(44),
                    span_of_schema(loaded, record.def),
                    format!("duplicate package name '{}'", record.package),
                )
                .with_label(span_of_schema(loaded, first.def), "also declared here"),
            );
        } else {
            seen.insert(record.package.as_str(), record);
        }
    }

    diags.extend(package_errors);
}

fn span_of_schema(loaded: &Loaded, def: DefId) -> Span {
    loaded.arena.def(def).span
}

/// Scheme of a URI-shaped origin, if any.
fn uri_scheme(origin: &str) -> Option<&str> {
    let (scheme, rest) = origin.split_once("://")?;
    (!scheme.is_empty() && !rest.is_empty()).then_some(scheme)
}

/// Host portion of a URI-shaped origin.
fn uri_host(origin: &str) -> Option<&str> {
    let (_, rest) = origin.split_once("://")?;
    let host = rest.split(['/', ':']).next()?;
    (!host.is_empty()).then_some(host)
}

/// Reverse-DNS form of a host, with the optional `www.` prefix dropped.
fn reverse_dns(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut parts: Vec<&str> = host.split('.').collect();
    parts.reverse();
    parts.join(".")
}
