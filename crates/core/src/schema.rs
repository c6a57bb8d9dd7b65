//! Source schema declarations.
//!
//! A schema declares the columns of one row source and its primary key.
//! Schemas are built through `SchemaBuilder`, which validates names and
//! key declarations up front so every later column lookup is infallible.

use crate::error::{Error, Result};
use crate::row::{Row, RowKey};
use crate::types::ValueType;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// A column declaration.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    value_type: ValueType,
    nullable: bool,
}

impl Column {
    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns whether the column allows nulls.
    #[inline]
    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// The schema of one row source.
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<usize>,
}

impl Schema {
    /// Returns the source name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns in declaration order.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the primary-key column positions, in declared key order.
    #[inline]
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Gets a column position by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Gets a column position by name, failing with `ColumnNotFound`.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::column_not_found(self.name.clone(), name))
    }

    /// Extracts the primary-key tuple of a row.
    pub fn row_key(&self, row: &Row) -> RowKey {
        RowKey::extract(row, &self.primary_key)
    }

    /// Validates a row against this schema: column count, value types, and
    /// non-null primary key.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::constraint(format!(
                "table {} expects {} columns, row has {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }
        for (pos, column) in self.columns.iter().enumerate() {
            let value = row.get(pos).expect("length checked above");
            match value.value_type() {
                None => {
                    if !column.nullable || self.primary_key.contains(&pos) {
                        return Err(Error::constraint(format!(
                            "null in non-nullable column {}.{}",
                            self.name, column.name
                        )));
                    }
                }
                Some(vt) => {
                    if vt != column.value_type {
                        return Err(Error::constraint(format!(
                            "column {}.{} expects {}, got {}",
                            self.name,
                            column.name,
                            column.value_type.name(),
                            vt.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builder for source schemas.
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl SchemaBuilder {
    /// Creates a new schema builder for a named source.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            primary_key: Vec::new(),
        })
    }

    /// Adds a nullable column.
    pub fn column(self, name: impl Into<String>, value_type: ValueType) -> Result<Self> {
        self.add(name, value_type, true)
    }

    /// Adds a non-nullable column.
    pub fn required_column(self, name: impl Into<String>, value_type: ValueType) -> Result<Self> {
        self.add(name, value_type, false)
    }

    fn add(mut self, name: impl Into<String>, value_type: ValueType, nullable: bool) -> Result<Self> {
        let name = name.into();
        check_name(&name)?;
        if self.columns.iter().any(|c| c.name == name) {
            return Err(Error::invalid_schema(format!(
                "duplicate column {} in table {}",
                name, self.name
            )));
        }
        self.columns.push(Column {
            name,
            value_type,
            nullable,
        });
        Ok(self)
    }

    /// Declares the primary key columns, in key order.
    pub fn primary_key(mut self, columns: &[&str]) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "empty primary key for table {}",
                self.name
            )));
        }
        self.primary_key = columns.iter().map(|c| String::from(*c)).collect();
        Ok(self)
    }

    /// Builds and validates the schema.
    pub fn build(self) -> Result<Schema> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema(format!(
                "table {} has no columns",
                self.name
            )));
        }
        if self.primary_key.is_empty() {
            return Err(Error::invalid_schema(format!(
                "table {} has no primary key",
                self.name
            )));
        }
        let mut key_positions = Vec::with_capacity(self.primary_key.len());
        for key_col in &self.primary_key {
            let pos = self
                .columns
                .iter()
                .position(|c| &c.name == key_col)
                .ok_or_else(|| {
                    Error::invalid_schema(format!(
                        "primary key column {} not declared in table {}",
                        key_col, self.name
                    ))
                })?;
            if key_positions.contains(&pos) {
                return Err(Error::invalid_schema(format!(
                    "primary key column {} repeated in table {}",
                    key_col, self.name
                )));
            }
            key_positions.push(pos);
        }
        Ok(Schema {
            name: self.name,
            columns: self.columns,
            primary_key: key_positions,
        })
    }
}

/// Validates an identifier: letter or underscore first, then alphanumerics.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_schema("name cannot be empty"));
    }
    let first = name.chars().next().expect("non-empty checked above");
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::invalid_schema(format!(
            "name must start with a letter or underscore: {}",
            name
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_schema(format!(
            "name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}
