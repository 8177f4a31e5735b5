//! The schema registry.
//!
//! Holds all loaded schemas keyed by canonical origin, with lookup by
//! package name once phase 0 has established that package names are
//! unique. Records are created by the loader and annotated (realization
//! flag) by phase 5; nothing is ever removed.

use crate::ast::{DefId, Import};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One loaded schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// The schema definition in the arena
    pub def: DefId,
    /// Declared package name (dot-separated, lowercased)
    pub package: String,
    /// Canonical origin: absolute file path, URI, or builtin marker
    pub origin: String,
    /// Id of the source in the compilation's source map
    pub file_id: u16,
    /// Import table, in source order; resolved by the loader
    pub imports: Vec<Import>,
    /// Directory of the source file, for import resolution
    pub dir: Option<PathBuf>,
    /// True for schemas passed on the command line
    pub is_top: bool,
    /// Phase 5: reachable from a top schema through `require`
    pub realized: bool,
}

/// All loaded schemas of a compilation.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    records: IndexMap<String, SchemaRecord>,
    by_def: HashMap<DefId, String>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded schema under its canonical origin.
    pub fn add(&mut self, record: SchemaRecord) {
        self.by_def.insert(record.def, record.origin.clone());
        self.records.insert(record.origin.clone(), record);
    }

    /// Look up by canonical origin.
    pub fn by_origin(&self, origin: &str) -> Option<&SchemaRecord> {
        self.records.get(origin)
    }

    /// Look up by declared package name.
    ///
    /// Unambiguous once phase 0's uniqueness check has passed.
    pub fn by_package(&self, package: &str) -> Option<&SchemaRecord> {
        self.records.values().find(|r| r.package == package)
    }

    /// Look up by schema definition id.
    pub fn by_def(&self, def: DefId) -> Option<&SchemaRecord> {
        self.by_def.get(&def).and_then(|origin| self.records.get(origin))
    }

    /// Mutable lookup by schema definition id.
    pub fn by_def_mut(&mut self, def: DefId) -> Option<&mut SchemaRecord> {
        let origin = self.by_def.get(&def)?.clone();
        self.records.get_mut(&origin)
    }

    /// True when the origin has already been loaded.
    pub fn contains_origin(&self, origin: &str) -> bool {
        self.records.contains_key(origin)
    }

    /// All records, in load order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaRecord> {
        self.records.values()
    }

    /// All records mutably, in load order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SchemaRecord> {
        self.records.values_mut()
    }

    /// Number of loaded schemas.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
