//! Tributary Core - foundational types and change-propagation contracts.
//!
//! This crate provides everything the rest of the engine builds on:
//!
//! - `Value` / `ValueType`: primitive cell values with a total order
//! - `Row` / `RowKey`: immutable rows and extracted primary-key tuples
//! - `Schema` / `SchemaBuilder`: per-source column and key declarations
//! - `SortSpec` / `ResolvedSort`: orderings, normalized with the primary key
//! - `SourceChange` / `Change` / `Node`: the change-propagation protocol
//! - `Constraint` / `Filters` / `FetchRequest`: fetch scoping and push-down
//! - `NodeStream`: single-pass lazy node sequences
//! - `Operator` / `Output`: the contracts every pipeline stage implements
//! - `Error`: the engine-wide error taxonomy
//!
//! # Example
//!
//! ```rust
//! use tributary_core::schema::SchemaBuilder;
//! use tributary_core::{Row, SortSpec, Value, ValueType};
//!
//! let schema = SchemaBuilder::new("issues")
//!     .unwrap()
//!     .column("id", ValueType::Text)
//!     .unwrap()
//!     .column("modified", ValueType::Int)
//!     .unwrap()
//!     .primary_key(&["id"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let row = Row::new(vec![Value::Text("i1".into()), Value::Int(42)]);
//! assert_eq!(schema.row_key(&row).values(), &[Value::Text("i1".into())]);
//!
//! // Orderings are always closed under the primary key.
//! let ordering = SortSpec::desc("modified").normalized(&schema);
//! assert_eq!(ordering.keys().len(), 2);
//! ```

#![no_std]

extern crate alloc;

mod change;
mod constraint;
mod error;
mod flow;
mod node;
mod row;
pub mod schema;
mod sort;
mod stream;
mod types;
mod value;

pub use change::{Change, SourceChange};
pub use constraint::{CmpOp, Condition, Constraint, FetchRequest, FilterSpec, Filters, ScanBound};
pub use error::{Error, Result};
pub use flow::{FlowInfo, Operator, Output, OutputSlot};
pub use node::{Node, Relationship};
pub use row::{Row, RowKey};
pub use schema::{Column, Schema, SchemaBuilder};
pub use sort::{Direction, ResolvedSort, SortSpec};
pub use stream::{NextFn, NodeStream};
pub use types::ValueType;
pub use value::Value;
