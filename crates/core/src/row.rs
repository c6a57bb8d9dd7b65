//! Row and primary-key types.
//!
//! A `Row` is an immutable tuple of values laid out in schema column order.
//! Rows are shared through the pipeline graph as `Rc<Row>`; mutation is only
//! ever expressed as an `(old, new)` pair of rows. A `RowKey` is the
//! extracted primary-key tuple that identifies a row within its source and
//! inside operator scratch storage.

use crate::value::Value;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

/// A row of values, stored in schema column order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Row {
    values: Box<[Value]>,
}

impl Row {
    /// Creates a row from a vector of values.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_boxed_slice(),
        }
    }

    /// Creates a reference-counted row, the form that flows through the graph.
    pub fn shared(values: Vec<Value>) -> Rc<Self> {
        Rc::new(Self::new(values))
    }

    /// Gets a value at the given column position.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Extracts the values at the given column positions.
    ///
    /// Missing positions produce `Null`; the pipeline only requests
    /// positions that the owning schema validated at build time.
    pub fn project(&self, positions: &[usize]) -> Vec<Value> {
        positions
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// The extracted primary-key tuple of a row.
///
/// Keys compare and hash by value, so they serve as the authoritative map
/// key at a source, the parent half of join scratch keys, and the lookup
/// key for view entries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    values: Box<[Value]>,
}

impl RowKey {
    /// Builds a key from already-extracted values.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_boxed_slice(),
        }
    }

    /// Extracts the key of `row` at the given primary-key column positions.
    pub fn extract(row: &Row, positions: &[usize]) -> Self {
        Self::new(row.project(positions))
    }

    /// Returns the key values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
