//! Ordering specifications.
//!
//! An ordering is a sequence of `(column, direction)` pairs. Every ordering
//! the engine actually uses is *normalized*: the primary-key columns are
//! appended ascending if absent, which makes the ordering a total order over
//! the source. Sources, window operators, and views all compare rows by the
//! same normalized spec.

use crate::error::Result;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Sort direction for one ordering column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Ascending order (smallest first)
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Direction {
    /// Applies this direction to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// A caller-specified ordering, by column name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, Direction)>,
}

impl SortSpec {
    /// Creates an empty spec. Normalization will fill in the primary key.
    pub fn unordered() -> Self {
        Self { keys: Vec::new() }
    }

    /// Creates a spec with a single ascending column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            keys: alloc::vec![(column.into(), Direction::Asc)],
        }
    }

    /// Creates a spec with a single descending column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            keys: alloc::vec![(column.into(), Direction::Desc)],
        }
    }

    /// Appends another ordering column.
    pub fn then(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.keys.push((column.into(), direction));
        self
    }

    /// Returns the ordering keys.
    pub fn keys(&self) -> &[(String, Direction)] {
        &self.keys
    }

    /// Normalizes this spec against a schema by appending any missing
    /// primary-key columns ascending. The result is total over the source.
    pub fn normalized(&self, schema: &Schema) -> SortSpec {
        let mut keys = self.keys.clone();
        for &pk_pos in schema.primary_key() {
            let pk_name = schema.columns()[pk_pos].name();
            if !keys.iter().any(|(name, _)| name == pk_name) {
                keys.push((pk_name.to_string(), Direction::Asc));
            }
        }
        SortSpec { keys }
    }

    /// Resolves column names to positions. Fails with `ColumnNotFound` if a
    /// key names a column the schema does not have.
    pub fn resolve(&self, schema: &Schema) -> Result<ResolvedSort> {
        let mut keys = Vec::with_capacity(self.keys.len());
        for (name, direction) in &self.keys {
            let pos = schema.require_column(name)?;
            keys.push((pos, *direction));
        }
        Ok(ResolvedSort { keys })
    }
}

/// An ordering resolved to column positions, ready for key extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSort {
    keys: Vec<(usize, Direction)>,
}

impl ResolvedSort {
    /// Returns the resolved `(position, direction)` pairs.
    pub fn keys(&self) -> &[(usize, Direction)] {
        &self.keys
    }

    /// Returns the directions, in key order.
    pub fn directions(&self) -> Vec<Direction> {
        self.keys.iter().map(|&(_, d)| d).collect()
    }

    /// Extracts the sort-key values of a row.
    pub fn sort_key(&self, row: &Row) -> Vec<Value> {
        self.keys
            .iter()
            .map(|&(pos, _)| row.get(pos).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
