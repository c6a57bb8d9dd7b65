//! Property-based tests for tributary-index using proptest.

use proptest::prelude::*;
use tributary_core::{Direction, RowKey, ScanBound, Value};
use tributary_index::{HashIndex, KeyComparator, OrderedIndex};

fn key(v: i64) -> Vec<Value> {
    vec![Value::Int(v)]
}

fn rk(v: i64) -> RowKey {
    RowKey::new(vec![Value::Int(v)])
}

proptest! {
    /// Every inserted pair can be retrieved from the hash index.
    #[test]
    fn hash_insert_get_roundtrip(values in prop::collection::vec(0i64..1000, 1..200)) {
        let mut index = HashIndex::new();
        for (i, &v) in values.iter().enumerate() {
            index.add(Value::Int(v), rk(i as i64));
        }
        for (i, &v) in values.iter().enumerate() {
            let keys = index.get(&Value::Int(v));
            prop_assert!(keys.contains(&rk(i as i64)), "pair ({}, {}) should exist", v, i);
        }
        prop_assert_eq!(index.len(), values.len());
    }

    /// Removing everything leaves the hash index empty.
    #[test]
    fn hash_remove_all_empties(values in prop::collection::vec(0i64..100, 1..100)) {
        let mut index = HashIndex::new();
        for (i, &v) in values.iter().enumerate() {
            index.add(Value::Int(v), rk(i as i64));
        }
        for (i, &v) in values.iter().enumerate() {
            index.remove(&Value::Int(v), &rk(i as i64));
        }
        prop_assert!(index.is_empty());
    }

    /// The ordered index keeps entries sorted under its comparator after
    /// any insertion order.
    #[test]
    fn ordered_index_stays_sorted(mut values in prop::collection::vec(0i64..1000, 1..200)) {
        let mut index = OrderedIndex::new(KeyComparator::new(vec![Direction::Asc]));
        values.dedup();
        for &v in &values {
            index.insert(key(v), rk(v));
        }
        let cmp = KeyComparator::new(vec![Direction::Asc]);
        for i in 1..index.len() {
            let (a, _) = index.get(i - 1).unwrap();
            let (b, _) = index.get(i).unwrap();
            prop_assert!(cmp.compare(a, b) != core::cmp::Ordering::Greater);
        }
    }

    /// `lower_bound` partitions the index exactly.
    #[test]
    fn ordered_index_lower_bound_partitions(
        values in prop::collection::vec(0i64..1000, 1..200),
        probe in 0i64..1000,
    ) {
        let mut index = OrderedIndex::new(KeyComparator::new(vec![Direction::Asc]));
        for &v in &values {
            index.insert(key(v), rk(v));
        }
        let bound = ScanBound { key: key(probe), inclusive: false };
        let pos = index.lower_bound(Some(&bound));
        for i in 0..pos {
            let (k, _) = index.get(i).unwrap();
            prop_assert!(k[0].as_int().unwrap() <= probe);
        }
        for i in pos..index.len() {
            let (k, _) = index.get(i).unwrap();
            prop_assert!(k[0].as_int().unwrap() > probe);
        }
    }

    /// Insert followed by remove restores the previous entries.
    #[test]
    fn ordered_index_insert_remove_roundtrip(
        values in prop::collection::vec(0i64..1000, 1..100),
        extra in 1001i64..2000,
    ) {
        let mut index = OrderedIndex::new(KeyComparator::new(vec![Direction::Asc]));
        for &v in &values {
            index.insert(key(v), rk(v));
        }
        let before = index.len();
        index.insert(key(extra), rk(extra));
        prop_assert_eq!(index.remove(&key(extra)), Some(rk(extra)));
        prop_assert_eq!(index.len(), before);
    }
}
