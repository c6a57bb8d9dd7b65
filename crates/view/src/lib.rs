//! Tributary View - ordered materialized views for the tributary IVM
//! engine.
//!
//! A `MaterializedView` sits at the top of a pipeline, maintaining the
//! final ordered sequence of entries with nested relationship arrays and
//! notifying listeners at flush boundaries. The `wire` module renders the
//! flushed change envelopes in the tagged-union JSON shape transports
//! forward.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::schema::SchemaBuilder;
//! use tributary_core::{Row, SortSpec, SourceChange, Value, ValueType};
//! use tributary_pipeline::PipelineBuilder;
//! use tributary_source::SourceSet;
//! use tributary_view::MaterializedView;
//!
//! let mut sources = SourceSet::new();
//! sources
//!     .create(
//!         SchemaBuilder::new("issues")
//!             .unwrap()
//!             .column("id", ValueType::Text)
//!             .unwrap()
//!             .primary_key(&["id"])
//!             .unwrap()
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let pipeline = PipelineBuilder::new(&sources, "issues")
//!     .ordered(SortSpec::asc("id"))
//!     .build()
//!     .unwrap();
//! let view = MaterializedView::attach(pipeline);
//! view.hydrate().unwrap();
//!
//! sources
//!     .push(
//!         "issues",
//!         SourceChange::Add(Row::new(vec![Value::Text("i1".into())])),
//!     )
//!     .unwrap();
//! assert_eq!(view.len(), 1);
//! view.flush();
//! ```

#![no_std]

extern crate alloc;

mod listener;
mod view;
pub mod wire;

pub use listener::{ListenerFn, ListenerId, ListenerTable};
pub use view::{MaterializedView, RelationshipData, ViewEntry};
