//! Shared helpers for the integration suites.
#![allow(dead_code)]

use yasdl::ast::DefId;
use yasdl::{compile_with, Compilation, CompileOptions, Failure, MemoryFetcher};

/// Compile a set of in-memory schemas.
pub fn try_compile(sources: &[(&str, &str)], tops: &[&str]) -> Result<Compilation, Failure> {
    let mut fetcher = MemoryFetcher::new();
    for (package, source) in sources {
        fetcher.add(package, source);
    }
    let tops: Vec<String> = tops.iter().map(|t| t.to_string()).collect();
    compile_with(&tops, &fetcher, &CompileOptions::new())
}

/// Compile and expect success.
pub fn compile_ok(sources: &[(&str, &str)], tops: &[&str]) -> Compilation {
    match try_compile(sources, tops) {
        Ok(compilation) => compilation,
        Err(failure) => panic!("compilation failed:\n{}", failure.render()),
    }
}

/// Compile and expect failure.
pub fn compile_err(sources: &[(&str, &str)], tops: &[&str]) -> Failure {
    match try_compile(sources, tops) {
        Ok(_) => panic!("compilation unexpectedly succeeded"),
        Err(failure) => failure,
    }
}

/// Look up a definition by dotted path below a schema package.
pub fn find(compilation: &Compilation, path: &str) -> DefId {
    let mut segments = path.split('.');
    let mut package = String::new();
    let mut schema = None;
    for segment in segments.by_ref() {
        if !package.is_empty() {
            package.push('.');
        }
        package.push_str(segment);
        if let Some(record) = compilation.registry.by_package(&package) {
            schema = Some(record.def);
            break;
        }
    }
    let mut current = schema.unwrap_or_else(|| panic!("no schema on path '{}'", path));
    for segment in segments {
        current = compilation
            .arena
            .static_child(current, segment)
            .unwrap_or_else(|| panic!("no child '{}' on path '{}'", segment, path));
    }
    current
}
