//! Operator scratch storage.
//!
//! A join's scratch is a keyed mapping from `(child join value, parent
//! primary key)` to a presence flag: exactly the set of parents currently
//! visible above the join, grouped by the join-key value they reference.
//! Removals use it to re-constrain the child input deterministically.

use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use tributary_core::{RowKey, Value};

/// The primary-key-set scratch of one join.
#[derive(Debug, Default)]
pub struct KeySet {
    map: HashMap<Value, HashSet<RowKey>>,
    len: usize,
}

impl KeySet {
    /// Creates an empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `parent` references `join_value`. Returns true if the
    /// pair was not present.
    pub fn insert(&mut self, join_value: Value, parent: RowKey) -> bool {
        let inserted = self.map.entry(join_value).or_default().insert(parent);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Forgets that `parent` references `join_value`. Returns true if the
    /// pair was present.
    pub fn remove(&mut self, join_value: &Value, parent: &RowKey) -> bool {
        let Some(parents) = self.map.get_mut(join_value) else {
            return false;
        };
        let removed = parents.remove(parent);
        if removed {
            self.len -= 1;
            if parents.is_empty() {
                self.map.remove(join_value);
            }
        }
        removed
    }

    /// Returns whether the pair is present.
    pub fn contains(&self, join_value: &Value, parent: &RowKey) -> bool {
        self.map
            .get(join_value)
            .map(|p| p.contains(parent))
            .unwrap_or(false)
    }

    /// Returns the number of `(join value, parent)` pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no pairs are recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns every pair, sorted, for deterministic assertions.
    pub fn snapshot(&self) -> Vec<(Value, RowKey)> {
        let mut pairs: Vec<(Value, RowKey)> = self
            .map
            .iter()
            .flat_map(|(v, parents)| parents.iter().map(move |p| (v.clone(), p.clone())))
            .collect();
        pairs.sort();
        pairs
    }
}
