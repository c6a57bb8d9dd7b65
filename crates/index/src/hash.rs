//! Secondary hash index.
//!
//! Maps one column's value to the primary keys of the rows holding it.
//! Sources maintain these synchronously with every change; joins use them
//! as the fast side of constrained fetches.

use alloc::vec::Vec;
use hashbrown::HashMap;
use tributary_core::{RowKey, Value};

/// A hash index over one column: value → primary keys of matching rows.
#[derive(Debug, Default)]
pub struct HashIndex {
    map: HashMap<Value, Vec<RowKey>>,
    entries: usize,
}

impl HashIndex {
    /// Creates an empty hash index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one `(value, key)` pair.
    pub fn add(&mut self, value: Value, key: RowKey) {
        self.map.entry(value).or_default().push(key);
        self.entries += 1;
    }

    /// Removes one `(value, key)` pair if present.
    pub fn remove(&mut self, value: &Value, key: &RowKey) {
        if let Some(keys) = self.map.get_mut(value) {
            let before = keys.len();
            keys.retain(|k| k != key);
            self.entries -= before - keys.len();
            if keys.is_empty() {
                self.map.remove(value);
            }
        }
    }

    /// Returns the primary keys of every row holding `value`, in insertion
    /// order.
    pub fn get(&self, value: &Value) -> &[RowKey] {
        self.map.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns whether any row holds `value`.
    pub fn contains(&self, value: &Value) -> bool {
        self.map.contains_key(value)
    }

    /// Returns the total number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Clears all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn key(id: &str) -> RowKey {
        RowKey::new(vec![Value::Text(id.into())])
    }

    #[test]
    fn test_add_and_get() {
        let mut index = HashIndex::new();
        index.add(Value::Text("i1".into()), key("c1"));
        index.add(Value::Text("i1".into()), key("c2"));
        index.add(Value::Text("i2".into()), key("c3"));

        assert_eq!(index.get(&Value::Text("i1".into())), &[key("c1"), key("c2")]);
        assert_eq!(index.get(&Value::Text("i2".into())), &[key("c3")]);
        assert!(index.get(&Value::Text("i9".into())).is_empty());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_remove_specific_pair() {
        let mut index = HashIndex::new();
        index.add(Value::Int(1), key("a"));
        index.add(Value::Int(1), key("b"));

        index.remove(&Value::Int(1), &key("a"));
        assert_eq!(index.get(&Value::Int(1)), &[key("b")]);
        assert_eq!(index.len(), 1);

        index.remove(&Value::Int(1), &key("b"));
        assert!(!index.contains(&Value::Int(1)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut index = HashIndex::new();
        index.add(Value::Int(1), key("a"));
        index.remove(&Value::Int(2), &key("a"));
        index.remove(&Value::Int(1), &key("zz"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_null_values_are_indexable() {
        let mut index = HashIndex::new();
        index.add(Value::Null, key("a"));
        assert!(index.contains(&Value::Null));
        assert_eq!(index.get(&Value::Null), &[key("a")]);
    }

    #[test]
    fn test_clear() {
        let mut index = HashIndex::new();
        index.add(Value::Int(1), key("a"));
        index.add(Value::Int(2), key("b"));
        index.clear();
        assert!(index.is_empty());
        assert!(index.get(&Value::Int(1)).is_empty());
    }
}
