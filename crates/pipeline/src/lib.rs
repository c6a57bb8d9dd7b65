//! Tributary Pipeline - dataflow operators for the tributary IVM engine.
//!
//! Operators subscribe to upstream inputs and expose themselves as inputs,
//! composing into query pipelines:
//!
//! - `Filter`: selection with edit-transition semantics
//! - `Take` / `Skip`: ordered windows over the upstream ordering
//! - `Join`: parent/child composition under a named relationship, with
//!   primary-key-set scratch storage
//! - `Prune`: strips hidden relationships from final output
//! - `PipelineBuilder`: assembles validated source → operator → view chains
//! - `probe`: test instrumentation (`Probe`, `Sink`)
//!
//! A single primitive change at a source triggers a bounded cascade of
//! derived changes through the chain; each operator consumes one change at
//! a time, updates its scratch, and emits zero or more changes downstream.
//!
//! # Example
//!
//! ```rust
//! use tributary_core::schema::SchemaBuilder;
//! use tributary_core::{Row, SortSpec, SourceChange, Value, ValueType};
//! use tributary_pipeline::{JoinSpec, PipelineBuilder};
//! use tributary_source::SourceSet;
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
//! sources
//!     .create(
//!         SchemaBuilder::new("comments")
//!             .unwrap()
//!             .column("id", ValueType::Text)
//!             .unwrap()
//!             .column("issueID", ValueType::Text)
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
//!     .join(JoinSpec::new("comments", "id", "issueID", "comments"))
//!     .build()
//!     .unwrap();
//!
//! sources
//!     .push(
//!         "issues",
//!         SourceChange::Add(Row::new(vec![Value::Text("i1".into())])),
//!     )
//!     .unwrap();
//!
//! use tributary_core::{FetchRequest, Operator};
//! let nodes = pipeline.root().fetch(FetchRequest::all()).unwrap().drain().unwrap();
//! assert_eq!(nodes.len(), 1);
//! assert!(nodes[0].relationship("comments").is_some());
//! ```

#![no_std]

extern crate alloc;

mod builder;
mod filter;
mod join;
pub mod probe;
mod prune;
mod scratch;
mod skip;
mod take;

pub use builder::{JoinSpec, Pipeline, PipelineBuilder, RelationshipLayout, ViewLayout};
pub use filter::Filter;
pub use join::{Join, JoinParams};
pub use prune::Prune;
pub use scratch::KeySet;
pub use skip::Skip;
pub use take::Take;
