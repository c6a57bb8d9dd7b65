//! Ordered index.
//!
//! Keeps `(sort key, primary key)` pairs strictly ascending under a
//! direction-aware comparator. One ordered index exists per (source,
//! distinct connected ordering); its scans back every ordered fetch.
//!
//! Sort keys are always normalized (primary-key columns appended), so two
//! distinct rows can never carry equal keys and the sequence is a total
//! order.

use crate::comparator::KeyComparator;
use alloc::vec::Vec;
use core::cmp::Ordering;
use tributary_core::{RowKey, ScanBound, Value};

/// A sorted mapping from composite sort key to row primary key.
pub struct OrderedIndex {
    comparator: KeyComparator,
    entries: Vec<(Vec<Value>, RowKey)>,
}

impl OrderedIndex {
    /// Creates an empty index ordered by the given comparator.
    pub fn new(comparator: KeyComparator) -> Self {
        Self {
            comparator,
            entries: Vec::new(),
        }
    }

    /// Returns the comparator this index orders by.
    pub fn comparator(&self) -> &KeyComparator {
        &self.comparator
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an entry at its sorted position.
    ///
    /// Keys are unique by construction; inserting an existing key replaces
    /// its row key (this only happens when an edit re-inserts the same
    /// normalized key).
    pub fn insert(&mut self, key: Vec<Value>, row_key: RowKey) {
        let pos = self.partition(&key, false);
        if pos < self.entries.len() && self.comparator.is_equal(&self.entries[pos].0, &key) {
            self.entries[pos] = (key, row_key);
        } else {
            self.entries.insert(pos, (key, row_key));
        }
    }

    /// Removes the entry with exactly this sort key, returning its row key.
    pub fn remove(&mut self, key: &[Value]) -> Option<RowKey> {
        let pos = self.partition(key, false);
        if pos < self.entries.len() && self.comparator.is_equal(&self.entries[pos].0, key) {
            Some(self.entries.remove(pos).1)
        } else {
            None
        }
    }

    /// Returns the entry at a scan position.
    pub fn get(&self, pos: usize) -> Option<(&[Value], &RowKey)> {
        self.entries.get(pos).map(|(k, r)| (k.as_slice(), r))
    }

    /// Returns the first scan position at or after the given bound, or 0
    /// when no bound is given.
    pub fn lower_bound(&self, bound: Option<&ScanBound>) -> usize {
        match bound {
            None => 0,
            Some(b) => self.partition(&b.key, !b.inclusive),
        }
    }

    /// Clears all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// First index whose key is >= `key` (or > when `strict`).
    fn partition(&self, key: &[Value], strict: bool) -> usize {
        self.entries.partition_point(|(k, _)| {
            let ord = self.comparator.compare(k, key);
            if strict {
                ord != Ordering::Greater
            } else {
                ord == Ordering::Less
            }
        })
    }
}
