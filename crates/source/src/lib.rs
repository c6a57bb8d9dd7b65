//! Tributary Source - row sources for the tributary IVM engine.
//!
//! A `Table` owns the authoritative rows of one schema and every index
//! derived from them. Operators connect through `Table::connect`, which
//! returns an ordered, optionally push-down-filtered `Operator` handle;
//! `Table::push` is the sole ingestion point and fans each primitive
//! change out to every connection in registration order.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::schema::SchemaBuilder;
//! use tributary_core::{FetchRequest, Row, SortSpec, SourceChange, Value, ValueType};
//! use tributary_source::Table;
//!
//! let table = Table::new(
//!     SchemaBuilder::new("issues")
//!         .unwrap()
//!         .column("id", ValueType::Text)
//!         .unwrap()
//!         .primary_key(&["id"])
//!         .unwrap()
//!         .build()
//!         .unwrap(),
//! );
//!
//! let conn = table.connect(SortSpec::unordered(), None).unwrap();
//! table
//!     .push(SourceChange::Add(Row::new(vec![Value::Text("i1".into())])))
//!     .unwrap();
//!
//! use tributary_core::Operator;
//! let rows = conn.fetch(FetchRequest::all()).unwrap().drain().unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

#![no_std]

extern crate alloc;

mod registry;
mod table;

pub use registry::SourceSet;
pub use table::{SharedHashIndex, SourceHandle, Table};
