//! Tributary Index - index implementations for the tributary IVM engine.
//!
//! This crate provides the two index shapes sources maintain:
//!
//! - `HashIndex`: O(1) point lookups from a column value to the primary
//!   keys of matching rows; the fast side of every join.
//! - `OrderedIndex`: strictly-ascending `(sort key, primary key)` pairs
//!   under a direction-aware `KeyComparator`; backs every ordered scan.
//!
//! # Example
//!
//! ```rust
//! use tributary_index::{HashIndex, KeyComparator, OrderedIndex};
//! use tributary_core::{Direction, RowKey, Value};
//!
//! let mut hash = HashIndex::new();
//! hash.add(Value::Text("i1".into()), RowKey::new(vec![Value::Text("c1".into())]));
//! assert_eq!(hash.get(&Value::Text("i1".into())).len(), 1);
//!
//! let mut ordered = OrderedIndex::new(KeyComparator::new(vec![Direction::Asc]));
//! ordered.insert(vec![Value::Int(2)], RowKey::new(vec![Value::Int(2)]));
//! ordered.insert(vec![Value::Int(1)], RowKey::new(vec![Value::Int(1)]));
//! assert_eq!(ordered.get(0).unwrap().0, &[Value::Int(1)]);
//! ```

#![no_std]

extern crate alloc;

pub mod comparator;
pub mod hash;
pub mod ordered;

pub use comparator::{compare_rows, KeyComparator};
pub use hash::HashIndex;
pub use ordered::OrderedIndex;
