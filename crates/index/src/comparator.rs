//! Comparators for composite sort keys.
//!
//! A `KeyComparator` compares extracted sort-key tuples under a sequence of
//! per-column directions. Ordered indices, window operators, and views all
//! compare through the same comparator so a pipeline's notion of row order
//! is identical at every stage.

use alloc::vec::Vec;
use core::cmp::Ordering;
use tributary_core::{Direction, ResolvedSort, Row, Value};

/// Compares composite sort keys under per-column directions.
#[derive(Clone, Debug)]
pub struct KeyComparator {
    directions: Vec<Direction>,
}

impl KeyComparator {
    /// Creates a comparator with the given directions.
    pub fn new(directions: Vec<Direction>) -> Self {
        Self { directions }
    }

    /// Creates the comparator matching a resolved ordering.
    pub fn for_sort(sort: &ResolvedSort) -> Self {
        Self {
            directions: sort.directions(),
        }
    }

    /// Returns the directions of this comparator.
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Compares two sort-key tuples.
    ///
    /// A missing component compares below a present one, so a truncated
    /// prefix key can be used as a scan bound.
    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, direction) in self.directions.iter().enumerate() {
            let cmp = match (a.get(i), b.get(i)) {
                (Some(av), Some(bv)) => direction.apply(av.cmp(bv)),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }

    /// Returns true if a < b under this comparator.
    pub fn is_less(&self, a: &[Value], b: &[Value]) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a == b under this comparator.
    pub fn is_equal(&self, a: &[Value], b: &[Value]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Compares two rows under a resolved ordering, extracting keys on the fly.
pub fn compare_rows(sort: &ResolvedSort, a: &Row, b: &Row) -> Ordering {
    for &(pos, direction) in sort.keys() {
        let av = a.get(pos).unwrap_or(&Value::Null);
        let bv = b.get(pos).unwrap_or(&Value::Null);
        let cmp = direction.apply(av.cmp(bv));
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}
