//! Pipeline assembly.
//!
//! `PipelineBuilder` turns a declarative query description (root source,
//! ordering, filters, window, joins) into a wired operator chain plus the
//! `ViewLayout` a materialized view needs to apply nested changes. All
//! schema validation happens here, so a built pipeline never fails a
//! column lookup at runtime.
//!
//! Operators are stacked in a fixed order regardless of call order:
//! source, filter, skip, take, joins, prune. Windows clamp parent rows
//! before relationships attach, and hash indices are created on every
//! join-key column so constrained fetches stay point lookups.

use crate::filter::Filter;
use crate::join::{Join, JoinParams};
use crate::prune::Prune;
use crate::skip::Skip;
use crate::take::Take;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashSet;
use tributary_core::{
    Error, FilterSpec, Filters, Operator, ResolvedSort, Result, Schema, SortSpec,
};
use tributary_source::{SourceSet, Table};

/// Declaration of one join hop, possibly with nested hops under it.
#[derive(Clone, Debug)]
pub struct JoinSpec {
    child: String,
    parent_key: String,
    child_key: String,
    relationship: String,
    hidden: bool,
    singular: bool,
    ordering: SortSpec,
    nested: Vec<JoinSpec>,
}

impl JoinSpec {
    /// Declares a visible, plural join onto `child`.
    pub fn new(
        child: impl Into<String>,
        parent_key: impl Into<String>,
        child_key: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            child: child.into(),
            parent_key: parent_key.into(),
            child_key: child_key.into(),
            relationship: relationship.into(),
            hidden: false,
            singular: false,
            ordering: SortSpec::unordered(),
            nested: Vec::new(),
        }
    }

    /// Hides the relationship from final output.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Declares the relationship singular (at most one child per parent,
    /// enforced by the view).
    pub fn singular(mut self) -> Self {
        self.singular = true;
        self
    }

    /// Sets the child ordering (normalized with the child's primary key).
    pub fn ordered(mut self, ordering: SortSpec) -> Self {
        self.ordering = ordering;
        self
    }

    /// Nests a further join under this one's child.
    pub fn nest(mut self, nested: JoinSpec) -> Self {
        self.nested.push(nested);
        self
    }
}

/// What a view needs to apply changes under one relationship.
#[derive(Clone, Debug)]
pub struct RelationshipLayout {
    /// Relationship name.
    pub name: Rc<str>,
    /// At most one child per parent.
    pub singular: bool,
    /// The child schema (for wire rendering and key extraction).
    pub schema: Rc<Schema>,
    /// The child input's normalized ordering.
    pub sort: Rc<ResolvedSort>,
    /// Child primary-key column positions.
    pub pk: Vec<usize>,
    /// Layouts of relationships nested below this one.
    pub children: Vec<RelationshipLayout>,
}

/// What a view needs to apply top-level and nested changes.
#[derive(Clone, Debug)]
pub struct ViewLayout {
    /// The root schema (for wire rendering and key extraction).
    pub schema: Rc<Schema>,
    /// The root input's normalized ordering.
    pub sort: Rc<ResolvedSort>,
    /// Root primary-key column positions.
    pub pk: Vec<usize>,
    /// Visible relationships, in attachment order.
    pub relationships: Vec<RelationshipLayout>,
}

impl ViewLayout {
    /// Looks up a relationship layout by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipLayout> {
        self.relationships.iter().find(|r| &*r.name == name)
    }
}

/// A wired pipeline: the top operator plus the view layout.
pub struct Pipeline {
    root: Rc<dyn Operator>,
    layout: ViewLayout,
}

impl Pipeline {
    /// Returns the top operator, where a view attaches.
    pub fn root(&self) -> &Rc<dyn Operator> {
        &self.root
    }

    /// Returns the layout.
    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    /// Splits the pipeline into its parts.
    pub fn into_parts(self) -> (Rc<dyn Operator>, ViewLayout) {
        (self.root, self.layout)
    }
}

/// Builder for operator pipelines.
pub struct PipelineBuilder<'a> {
    sources: &'a SourceSet,
    root: String,
    ordering: SortSpec,
    filters: Vec<FilterSpec>,
    push_down: bool,
    skip: Option<usize>,
    take: Option<usize>,
    joins: Vec<JoinSpec>,
}

impl<'a> PipelineBuilder<'a> {
    /// Starts a pipeline rooted at the named source.
    pub fn new(sources: &'a SourceSet, root: impl Into<String>) -> Self {
        Self {
            sources,
            root: root.into(),
            ordering: SortSpec::unordered(),
            filters: Vec::new(),
            push_down: true,
            skip: None,
            take: None,
            joins: Vec::new(),
        }
    }

    /// Sets the result ordering.
    pub fn ordered(mut self, ordering: SortSpec) -> Self {
        self.ordering = ordering;
        self
    }

    /// Adds a filter condition (conjunctive).
    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    /// Disables filter push-down; a `Filter` operator is used instead of
    /// the source evaluating the conditions.
    pub fn without_push_down(mut self) -> Self {
        self.push_down = false;
        self
    }

    /// Skips the first `n` rows.
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    /// Limits the result to the first `n` rows.
    pub fn take(mut self, n: usize) -> Self {
        self.take = Some(n);
        self
    }

    /// Adds a join hop.
    pub fn join(mut self, spec: JoinSpec) -> Self {
        self.joins.push(spec);
        self
    }

    /// Validates the description, wires the operators, and returns the
    /// pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let mut seen = HashSet::new();
        let mut hidden = Vec::new();
        for join in &self.joins {
            collect_relationships(join, &mut seen, &mut hidden)?;
        }

        let table = self.sources.require(&self.root)?;
        let conn = if self.push_down && !self.filters.is_empty() {
            table.connect(self.ordering.clone(), Some(self.filters.as_slice()))?
        } else {
            table.connect(self.ordering.clone(), None)?
        };
        let root_schema = conn.info().schema().clone();
        let root_sort = conn.info().sort().clone();
        let root_pk = table.schema().primary_key().to_vec();

        let mut top: Rc<dyn Operator> = conn;
        if !self.push_down && !self.filters.is_empty() {
            let filters = Filters::resolve(&self.filters, &table.schema())?;
            top = Filter::link(top, filters);
        }
        if let Some(n) = self.skip {
            top = Skip::link(top, n);
        }
        if let Some(n) = self.take {
            top = Take::link(top, n);
        }

        let mut relationships = Vec::new();
        for spec in &self.joins {
            table.hash_index(&spec.parent_key)?;
            let (joined, layout) = build_join(self.sources, top, spec)?;
            top = joined;
            if let Some(layout) = layout {
                relationships.push(layout);
            }
        }

        if !hidden.is_empty() {
            top = Prune::link(top, hidden);
        }

        log::debug!(
            "pipeline built over {}: {} join(s), {} filter(s)",
            self.root,
            self.joins.len(),
            self.filters.len()
        );

        Ok(Pipeline {
            root: top,
            layout: ViewLayout {
                schema: root_schema,
                sort: root_sort,
                pk: root_pk,
                relationships,
            },
        })
    }
}

/// Rejects overlapping relationship names anywhere in the pipeline and
/// collects the hidden ones.
fn collect_relationships(
    spec: &JoinSpec,
    seen: &mut HashSet<String>,
    hidden: &mut Vec<String>,
) -> Result<()> {
    if !seen.insert(spec.relationship.clone()) {
        return Err(Error::invalid_schema(format!(
            "relationship name {} declared twice",
            spec.relationship
        )));
    }
    if spec.hidden {
        hidden.push(spec.relationship.clone());
    }
    for nested in &spec.nested {
        collect_relationships(nested, seen, hidden)?;
    }
    Ok(())
}

/// Wires one join hop (and its nested hops) above `parent`.
fn build_join(
    sources: &SourceSet,
    parent: Rc<dyn Operator>,
    spec: &JoinSpec,
) -> Result<(Rc<dyn Operator>, Option<RelationshipLayout>)> {
    let child_table: &Table = sources.require(&spec.child)?;
    child_table.hash_index(&spec.child_key)?;
    let child_conn = child_table.connect(spec.ordering.clone(), None)?;
    let child_schema = child_conn.info().schema().clone();
    let child_sort = child_conn.info().sort().clone();
    let child_pk = child_table.schema().primary_key().to_vec();

    let mut child_op: Rc<dyn Operator> = child_conn;
    let mut nested_layouts = Vec::new();
    for nested in &spec.nested {
        child_table.hash_index(&nested.parent_key)?;
        let (joined, layout) = build_join(sources, child_op, nested)?;
        child_op = joined;
        if let Some(layout) = layout {
            nested_layouts.push(layout);
        }
    }

    let params = JoinParams {
        parent_key: spec.parent_key.clone(),
        child_key: spec.child_key.clone(),
        relationship: spec.relationship.clone(),
        hidden: spec.hidden,
    };
    let join = Join::link(parent, child_op, params)?;

    let layout = (!spec.hidden).then(|| RelationshipLayout {
        name: Rc::from(spec.relationship.as_str()),
        singular: spec.singular,
        schema: child_schema,
        sort: child_sort,
        pk: child_pk,
        children: nested_layouts,
    });
    Ok((join as Rc<dyn Operator>, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Sink;
    use alloc::vec;
    use tributary_core::schema::SchemaBuilder;
    use tributary_core::{
        Change, CmpOp, FetchRequest, Row, SourceChange, Value, ValueType,
    };

    fn sources() -> SourceSet {
        let mut set = SourceSet::new();
        set.create(
            SchemaBuilder::new("issues")
                .unwrap()
                .column("id", ValueType::Text)
                .unwrap()
                .column("status", ValueType::Text)
                .unwrap()
                .primary_key(&["id"])
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
        set.create(
            SchemaBuilder::new("comments")
                .unwrap()
                .column("id", ValueType::Text)
                .unwrap()
                .column("issueID", ValueType::Text)
                .unwrap()
                .primary_key(&["id"])
                .unwrap()
                .build()
                .unwrap(),
        )
        .unwrap();
        set
    }

    fn issue(id: &str, status: &str) -> Row {
        Row::new(vec![Value::Text(id.into()), Value::Text(status.into())])
    }

    fn comment(id: &str, issue_id: &str) -> Row {
        Row::new(vec![Value::Text(id.into()), Value::Text(issue_id.into())])
    }

    #[test]
    fn test_build_join_pipeline() {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .ordered(SortSpec::asc("id"))
            .join(JoinSpec::new("comments", "id", "issueID", "comments"))
            .build()
            .unwrap();

        let sink = Sink::attach(pipeline.root().clone());
        set.push("issues", SourceChange::Add(issue("i1", "open")))
            .unwrap();
        set.push("comments", SourceChange::Add(comment("c1", "i1")))
            .unwrap();

        let changes = sink.take();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].is_add());
        assert!(matches!(changes[1], Change::Child { .. }));

        let layout = pipeline.layout();
        assert!(layout.relationship("comments").is_some());
    }

    #[test]
    fn test_duplicate_relationship_rejected() {
        let set = sources();
        let result = PipelineBuilder::new(&set, "issues")
            .join(JoinSpec::new("comments", "id", "issueID", "comments"))
            .join(JoinSpec::new("comments", "id", "issueID", "comments"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_table_rejected() {
        let set = sources();
        assert!(PipelineBuilder::new(&set, "nope").build().is_err());
    }

    #[test]
    fn test_unknown_join_column_rejected() {
        let set = sources();
        let result = PipelineBuilder::new(&set, "issues")
            .join(JoinSpec::new("comments", "id", "wrong", "comments"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_without_push_down_uses_operator() {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .filter(FilterSpec::new("status", CmpOp::Eq, "open"))
            .without_push_down()
            .build()
            .unwrap();

        set.push("issues", SourceChange::Add(issue("i1", "open")))
            .unwrap();
        set.push("issues", SourceChange::Add(issue("i2", "closed")))
            .unwrap();

        let nodes = pipeline
            .root()
            .fetch(FetchRequest::all())
            .unwrap()
            .drain()
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_hidden_join_layout_excluded_and_pruned() {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .join(JoinSpec::new("comments", "id", "issueID", "comments").hidden())
            .build()
            .unwrap();

        assert!(pipeline.layout().relationships.is_empty());

        set.push("issues", SourceChange::Add(issue("i1", "open")))
            .unwrap();
        let nodes = pipeline
            .root()
            .fetch(FetchRequest::all())
            .unwrap()
            .drain()
            .unwrap();
        assert!(nodes[0].relationships().is_empty());
    }

    #[test]
    fn test_take_below_join_limits_parents() {
        let set = sources();
        let pipeline = PipelineBuilder::new(&set, "issues")
            .ordered(SortSpec::asc("id"))
            .take(1)
            .join(JoinSpec::new("comments", "id", "issueID", "comments"))
            .build()
            .unwrap();

        set.push("issues", SourceChange::Add(issue("i1", "open")))
            .unwrap();
        set.push("issues", SourceChange::Add(issue("i2", "open")))
            .unwrap();

        let nodes = pipeline
            .root()
            .fetch(FetchRequest::all())
            .unwrap()
            .drain()
            .unwrap();
        assert_eq!(nodes.len(), 1);

        let sink = Sink::attach(pipeline.root().clone());
        // A comment on the out-of-window issue produces nothing.
        set.push("comments", SourceChange::Add(comment("c2", "i2")))
            .unwrap();
        assert!(sink.take().is_empty());

        // A comment on the in-window issue produces a child envelope.
        set.push("comments", SourceChange::Add(comment("c1", "i1")))
            .unwrap();
        let changes = sink.take();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], Change::Child { .. }));
    }
}
