//! Multi-source registry.
//!
//! A `SourceSet` owns the row sources of one pipeline graph, by name. The
//! pipeline builder resolves table references through it, and transports
//! use it as the single ingestion surface.

use crate::table::Table;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use tributary_core::{Error, Result, Schema, SourceChange};

/// A named collection of row sources.
#[derive(Default)]
pub struct SourceSet {
    tables: HashMap<String, Table>,
}

impl SourceSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source for the given schema and registers it under the
    /// schema's name.
    pub fn create(&mut self, schema: Schema) -> Result<&Table> {
        let name = String::from(schema.name());
        if self.tables.contains_key(&name) {
            return Err(Error::invalid_schema(alloc::format!(
                "table {} already exists",
                name
            )));
        }
        self.tables.insert(name.clone(), Table::new(schema));
        Ok(self.tables.get(&name).expect("inserted above"))
    }

    /// Gets a source by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Gets a source by name, failing if absent.
    pub fn require(&self, name: &str) -> Result<&Table> {
        self.tables.get(name).ok_or_else(|| Error::InvalidSchema {
            message: alloc::format!("unknown table {}", name),
        })
    }

    /// Pushes a primitive change into the named source.
    pub fn push(&self, table: &str, change: SourceChange) -> Result<()> {
        self.require(table)?.push(change)
    }

    /// Returns the registered table names.
    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Returns the number of registered sources.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
