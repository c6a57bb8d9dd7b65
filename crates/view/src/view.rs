//! Ordered materialized view.
//!
//! A `MaterializedView` consumes the change stream of a pipeline's top
//! operator and maintains the final ordered sequence of entries, each with
//! recursively materialized relationship arrays (or singletons). Changes
//! are applied immediately; listeners are notified only at `flush`, so
//! consumers observe transaction boundaries rather than individual
//! changes.

use crate::listener::{ListenerId, ListenerTable};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use tributary_core::{
    Change, Error, FetchRequest, Node, Operator, Output, Result, ResolvedSort, Row, RowKey,
    Value,
};
use tributary_index::KeyComparator;
use tributary_pipeline::{Pipeline, RelationshipLayout, ViewLayout};

/// A materialized relationship: an ordered array, or a singleton when the
/// relationship was declared singular.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationshipData {
    /// Plural relationship, ordered by the child input's ordering.
    Many(Vec<ViewEntry>),
    /// Singular relationship; at most one entry.
    One(Option<Box<ViewEntry>>),
}

impl RelationshipData {
    /// Returns the number of child entries.
    pub fn len(&self) -> usize {
        match self {
            RelationshipData::Many(entries) => entries.len(),
            RelationshipData::One(slot) => slot.is_some() as usize,
        }
    }

    /// Returns true if there are no child entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One materialized row with its relationship subtrees.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewEntry {
    row: Rc<Row>,
    relationships: Vec<(Rc<str>, RelationshipData)>,
}

impl ViewEntry {
    /// Returns the entry's row.
    pub fn row(&self) -> &Rc<Row> {
        &self.row
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipData> {
        self.relationships
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, data)| data)
    }

    /// Returns the child entries of a plural relationship, or an empty
    /// slice for absent/singular ones.
    pub fn children(&self, name: &str) -> &[ViewEntry] {
        match self.relationship(name) {
            Some(RelationshipData::Many(entries)) => entries,
            _ => &[],
        }
    }
}

/// The ordered materialized view.
pub struct MaterializedView {
    input: Rc<dyn Operator>,
    layout: ViewLayout,
    data: RefCell<Vec<ViewEntry>>,
    pending: RefCell<Vec<Change>>,
    listeners: RefCell<ListenerTable>,
    hydrated: Cell<bool>,
    destroyed: Cell<bool>,
}

impl MaterializedView {
    /// Creates a view over a built pipeline and wires it as the top
    /// operator's output.
    pub fn attach(pipeline: Pipeline) -> Rc<MaterializedView> {
        let (root, layout) = pipeline.into_parts();
        Self::new(root, layout)
    }

    /// Creates a view over an operator with an explicit layout.
    pub fn new(input: Rc<dyn Operator>, layout: ViewLayout) -> Rc<MaterializedView> {
        let view = Rc::new(MaterializedView {
            input,
            layout,
            data: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
            listeners: RefCell::new(ListenerTable::new()),
            hydrated: Cell::new(false),
            destroyed: Cell::new(false),
        });
        let weak: Weak<MaterializedView> = Rc::downgrade(&view);
        view.input.set_output(weak);
        view
    }

    /// Returns the view layout.
    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    /// Performs the initial full fetch. A second call is a no-op.
    pub fn hydrate(&self) -> Result<()> {
        if self.hydrated.get() {
            return Ok(());
        }
        let stream = self.input.fetch(FetchRequest::all())?;
        let mut entries = Vec::new();
        let mut stream = stream;
        for node in &mut stream {
            entries.push(materialize_entry(node, &self.layout.relationships)?);
        }
        if let Some(err) = stream.take_error() {
            return Err(err);
        }
        *self.data.borrow_mut() = entries;
        self.hydrated.set(true);
        log::debug!("view hydrated: {} entries", self.data.borrow().len());
        Ok(())
    }

    /// Returns a snapshot of the materialized entries.
    pub fn entries(&self) -> Vec<ViewEntry> {
        self.data.borrow().clone()
    }

    /// Returns the top-level rows, in view order.
    pub fn rows(&self) -> Vec<Rc<Row>> {
        self.data.borrow().iter().map(|e| e.row.clone()).collect()
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Returns true if the view holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    /// Registers a flush listener.
    pub fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&[Change]) + 'static,
    {
        self.listeners.borrow_mut().add(callback)
    }

    /// Removes a flush listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers all buffered changes to listeners at once. Flushing with
    /// no buffered changes does not notify.
    pub fn flush(&self) {
        let changes = core::mem::take(&mut *self.pending.borrow_mut());
        if changes.is_empty() {
            return;
        }
        log::trace!("view flush: {} change(s)", changes.len());
        self.listeners.borrow().notify(&changes);
    }

    /// Detaches from upstream and drops all state.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.input.destroy();
        self.data.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        self.listeners.borrow_mut().clear();
    }

    fn apply(&self, change: Change) -> Result<()> {
        let mut data = self.data.borrow_mut();
        apply_many(
            &mut data,
            change,
            self.layout.schema.name(),
            &self.layout.sort,
            &self.layout.pk,
            &self.layout.relationships,
        )
    }
}

impl Output for MaterializedView {
    fn push(&self, change: Change) -> Result<()> {
        if self.destroyed.get() {
            return Ok(());
        }
        self.apply(change.clone())?;
        self.pending.borrow_mut().push(change);
        Ok(())
    }
}

/// Materializes a node into a view entry following the layout.
fn materialize_entry(node: Node, layouts: &[RelationshipLayout]) -> Result<ViewEntry> {
    let mut relationships = Vec::with_capacity(layouts.len());
    for layout in layouts {
        let nodes: Vec<Node> = node
            .relationship(&layout.name)
            .map(|r| r.nodes().to_vec())
            .unwrap_or_default();
        let data = if layout.singular {
            if nodes.len() > 1 {
                return Err(singular_breach(&layout.name));
            }
            match nodes.into_iter().next() {
                Some(child) => RelationshipData::One(Some(Box::new(materialize_entry(
                    child,
                    &layout.children,
                )?))),
                None => RelationshipData::One(None),
            }
        } else {
            let mut entries = Vec::with_capacity(nodes.len());
            for child in nodes {
                entries.push(materialize_entry(child, &layout.children)?);
            }
            RelationshipData::Many(entries)
        };
        relationships.push((layout.name.clone(), data));
    }
    Ok(ViewEntry {
        row: node.row().clone(),
        relationships,
    })
}

fn singular_breach(name: &str) -> Error {
    Error::invariant(alloc::format!(
        "singular relationship {} received a second child",
        name
    ))
}

/// Binary-search position of a sort key.
fn position(
    entries: &[ViewEntry],
    sort: &ResolvedSort,
    cmp: &KeyComparator,
    key: &[Value],
) -> usize {
    entries.partition_point(|e| cmp.compare(&sort.sort_key(&e.row), key) == Ordering::Less)
}

/// Index of the entry holding exactly this sort key, if any.
fn locate(
    entries: &[ViewEntry],
    sort: &ResolvedSort,
    cmp: &KeyComparator,
    key: &[Value],
) -> Option<usize> {
    let pos = position(entries, sort, cmp, key);
    match entries.get(pos) {
        Some(e) if cmp.is_equal(&sort.sort_key(&e.row), key) => Some(pos),
        _ => None,
    }
}

/// Applies one change to an ordered entry array.
fn apply_many(
    entries: &mut Vec<ViewEntry>,
    change: Change,
    table: &str,
    sort: &ResolvedSort,
    pk: &[usize],
    layouts: &[RelationshipLayout],
) -> Result<()> {
    let cmp = KeyComparator::for_sort(sort);
    match change {
        Change::Add(node) => {
            let key = sort.sort_key(node.row());
            let pos = position(entries, sort, &cmp, &key);
            if entries
                .get(pos)
                .map(|e| cmp.is_equal(&sort.sort_key(&e.row), &key))
                .unwrap_or(false)
            {
                return Err(Error::invariant(alloc::format!(
                    "duplicate add into view of {}",
                    table
                )));
            }
            entries.insert(pos, materialize_entry(node, layouts)?);
            Ok(())
        }
        Change::Remove(node) => {
            let key = sort.sort_key(node.row());
            match locate(entries, sort, &cmp, &key) {
                Some(pos) => {
                    entries.remove(pos);
                    Ok(())
                }
                None => Err(Error::invariant(alloc::format!(
                    "remove of a row missing from view of {}",
                    table
                ))),
            }
        }
        Change::Edit { old, new } => {
            if RowKey::extract(&old, pk) != RowKey::extract(&new, pk) {
                return Err(Error::primary_key_mismatch(
                    table,
                    RowKey::extract(&old, pk),
                    RowKey::extract(&new, pk),
                ));
            }
            let old_key = sort.sort_key(&old);
            let pos = locate(entries, sort, &cmp, &old_key).ok_or_else(|| {
                Error::invariant(alloc::format!(
                    "edit of a row missing from view of {}",
                    table
                ))
            })?;
            let new_key = sort.sort_key(&new);
            if cmp.is_equal(&old_key, &new_key) {
                entries[pos].row = new;
            } else {
                let mut entry = entries.remove(pos);
                entry.row = new;
                let npos = position(entries, sort, &cmp, &new_key);
                entries.insert(npos, entry);
            }
            Ok(())
        }
        Change::Child {
            row,
            relationship,
            change,
        } => {
            let key = sort.sort_key(&row);
            let pos = locate(entries, sort, &cmp, &key).ok_or_else(|| {
                Error::invariant(alloc::format!(
                    "child change for a parent missing from view of {}",
                    table
                ))
            })?;
            apply_child(&mut entries[pos], &relationship, *change, layouts)
        }
    }
}

/// Applies a change nested under one relationship of an entry.
fn apply_child(
    entry: &mut ViewEntry,
    relationship: &str,
    change: Change,
    layouts: &[RelationshipLayout],
) -> Result<()> {
    let layout = layouts
        .iter()
        .find(|l| &*l.name == relationship)
        .ok_or_else(|| {
            Error::invariant(alloc::format!("unknown relationship {}", relationship))
        })?;
    let data = entry
        .relationships
        .iter_mut()
        .find(|(name, _)| &**name == relationship)
        .map(|(_, data)| data)
        .expect("materialized entries carry every laid-out relationship");
    match data {
        RelationshipData::Many(children) => apply_many(
            children,
            change,
            layout.schema.name(),
            &layout.sort,
            &layout.pk,
            &layout.children,
        ),
        RelationshipData::One(slot) => apply_one(slot, change, layout),
    }
}

/// Applies a change to a singular relationship slot.
fn apply_one(
    slot: &mut Option<Box<ViewEntry>>,
    change: Change,
    layout: &RelationshipLayout,
) -> Result<()> {
    match change {
        Change::Add(node) => {
            if slot.is_some() {
                return Err(singular_breach(&layout.name));
            }
            *slot = Some(Box::new(materialize_entry(node, &layout.children)?));
            Ok(())
        }
        Change::Remove(node) => match slot.take() {
            Some(entry)
                if RowKey::extract(&entry.row, &layout.pk)
                    == RowKey::extract(node.row(), &layout.pk) =>
            {
                Ok(())
            }
            other => {
                *slot = other;
                Err(Error::invariant(alloc::format!(
                    "remove of a missing singular {} child",
                    layout.name
                )))
            }
        },
        Change::Edit { old, new } => {
            let entry = slot.as_mut().ok_or_else(|| {
                Error::invariant(alloc::format!(
                    "edit of an empty singular {} relationship",
                    layout.name
                ))
            })?;
            if RowKey::extract(&old, &layout.pk) != RowKey::extract(&new, &layout.pk) {
                return Err(Error::primary_key_mismatch(
                    layout.schema.name(),
                    RowKey::extract(&old, &layout.pk),
                    RowKey::extract(&new, &layout.pk),
                ));
            }
            entry.row = new;
            Ok(())
        }
        Change::Child {
            relationship,
            change,
            ..
        } => {
            let entry = slot.as_mut().ok_or_else(|| {
                Error::invariant(alloc::format!(
                    "child change under an empty singular {} relationship",
                    layout.name
                ))
            })?;
            apply_child(entry, &relationship, *change, &layout.children)
        }
    }
}
