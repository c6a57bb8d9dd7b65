//! The row source.
//!
//! A `Table` owns the authoritative rows of one declared schema, keyed by
//! primary key, plus every index derived from them: one ordered index per
//! distinct connected ordering and lazily-created hash indices shared by
//! joins. It is the sole ingestion point of the engine: `push` applies one
//! primitive change and fans the derived change out to every connection in
//! registration order.
//!
//! Contract checks (`DuplicatePrimaryKey`, `NotFound`, deep-equality on
//! remove, key equality on in-place edit) all run before anything is
//! mutated, so a failed push leaves every index untouched.

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use tributary_core::{
    Change, Error, FetchRequest, Filters, FilterSpec, FlowInfo, Node, NodeStream, Operator,
    Output, OutputSlot, Result, Row, RowKey, Schema, SortSpec, SourceChange, Value,
};
use tributary_index::{compare_rows, HashIndex, KeyComparator, OrderedIndex};

/// A shared, incrementally-maintained hash index over one column.
pub type SharedHashIndex = Rc<RefCell<HashIndex>>;

/// One maintained ordering over the table.
struct OrderingEntry {
    /// Normalized name-based spec, used to deduplicate connections.
    spec: SortSpec,
    sort: Rc<tributary_core::ResolvedSort>,
    index: OrderedIndex,
}

/// A registered connection, held weakly so dropped pipelines unregister
/// themselves; stale entries are pruned during fan-out.
struct Connection {
    id: u64,
    handle: Weak<SourceHandle>,
}

struct TableState {
    schema: Rc<Schema>,
    rows: BTreeMap<RowKey, Rc<Row>>,
    orderings: Vec<OrderingEntry>,
    hash_indices: Vec<(usize, SharedHashIndex)>,
    connections: Vec<Connection>,
    next_conn_id: u64,
}

/// A row source for one table.
#[derive(Clone)]
pub struct Table {
    state: Rc<RefCell<TableState>>,
    live_cursors: Rc<Cell<usize>>,
}

/// A primitive change after validation, ready for fan-out.
enum Applied {
    Add(Rc<Row>),
    Remove(Rc<Row>),
    Edit { old: Rc<Row>, new: Rc<Row> },
}

impl Table {
    /// Creates an empty source for the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            state: Rc::new(RefCell::new(TableState {
                schema: Rc::new(schema),
                rows: BTreeMap::new(),
                orderings: Vec::new(),
                hash_indices: Vec::new(),
                connections: Vec::new(),
                next_conn_id: 1,
            })),
            live_cursors: Rc::new(Cell::new(0)),
        }
    }

    /// Returns the table schema.
    pub fn schema(&self) -> Rc<Schema> {
        self.state.borrow().schema.clone()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.state.borrow().rows.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().rows.is_empty()
    }

    /// Returns the stored row with this primary key, if any.
    pub fn row(&self, key: &RowKey) -> Option<Rc<Row>> {
        self.state.borrow().rows.get(key).cloned()
    }

    /// Returns a snapshot of all rows in primary-key order.
    pub fn rows(&self) -> Vec<Rc<Row>> {
        self.state.borrow().rows.values().cloned().collect()
    }

    /// Connects an operator to this source.
    ///
    /// The returned handle produces rows in `ordering` (normalized with the
    /// primary key). When `filters` are given the source evaluates them
    /// itself during both scans and fan-out, and the handle reports
    /// `applied_filters() == true` so downstream must not re-filter.
    pub fn connect(
        &self,
        ordering: SortSpec,
        filters: Option<&[FilterSpec]>,
    ) -> Result<Rc<SourceHandle>> {
        let mut state = self.state.borrow_mut();
        let schema = state.schema.clone();
        let normalized = ordering.normalized(&schema);

        let ordering_idx = match state
            .orderings
            .iter()
            .position(|entry| entry.spec == normalized)
        {
            Some(idx) => idx,
            None => {
                let sort = Rc::new(normalized.resolve(&schema)?);
                let mut index = OrderedIndex::new(KeyComparator::for_sort(&sort));
                for (key, row) in &state.rows {
                    index.insert(sort.sort_key(row), key.clone());
                }
                state.orderings.push(OrderingEntry {
                    spec: normalized.clone(),
                    sort,
                    index,
                });
                state.orderings.len() - 1
            }
        };

        let resolved_filters = match filters {
            Some(specs) => Filters::resolve(specs, &schema)?,
            None => Filters::default(),
        };
        let applied_filters = !resolved_filters.is_empty();

        let info = FlowInfo::new(schema, &normalized)?;
        let id = state.next_conn_id;
        state.next_conn_id += 1;

        let handle = Rc::new(SourceHandle {
            state: self.state.clone(),
            live_cursors: self.live_cursors.clone(),
            stream_live: Rc::new(Cell::new(false)),
            id,
            ordering: ordering_idx,
            filters: resolved_filters,
            applied_filters,
            info,
            output: OutputSlot::new(),
            destroyed: Cell::new(false),
        });
        state.connections.push(Connection {
            id,
            handle: Rc::downgrade(&handle),
        });
        Ok(handle)
    }

    /// Lazily builds (or returns the existing) hash index on `column`.
    /// The same instance is returned for later callers and is maintained
    /// synchronously with every push.
    pub fn hash_index(&self, column: &str) -> Result<SharedHashIndex> {
        let mut state = self.state.borrow_mut();
        let pos = state.schema.require_column(column)?;
        if let Some((_, index)) = state.hash_indices.iter().find(|(p, _)| *p == pos) {
            return Ok(index.clone());
        }
        let mut index = HashIndex::new();
        for (key, row) in &state.rows {
            index.add(row.get(pos).cloned().unwrap_or(Value::Null), key.clone());
        }
        let shared = Rc::new(RefCell::new(index));
        state.hash_indices.push((pos, shared.clone()));
        Ok(shared)
    }

    /// Applies one primitive change and fans the derived change out to
    /// every connection in registration order.
    ///
    /// An `edit` whose primary key differs between old and new rows is
    /// decomposed here into `remove(old)` then `add(new)`; connections see
    /// the two separate changes in that order.
    pub fn push(&self, change: SourceChange) -> Result<()> {
        if self.live_cursors.get() != 0 {
            return Err(Error::out_of_order(
                "push while a fetch cursor is outstanding",
            ));
        }

        let applied = {
            let mut state = self.state.borrow_mut();
            state.apply(change)?
        };

        let handles: Vec<Rc<SourceHandle>> = {
            let mut state = self.state.borrow_mut();
            let before = state.connections.len();
            state.connections.retain(|c| c.handle.strong_count() > 0);
            if state.connections.len() < before {
                log::warn!(
                    "{}: pruned {} stale connection(s)",
                    state.schema.name(),
                    before - state.connections.len()
                );
            }
            state
                .connections
                .iter()
                .filter_map(|c| c.handle.upgrade())
                .collect()
        };

        for change in &applied {
            log::debug!(
                "source push: {} -> {} connection(s)",
                match change {
                    Applied::Add(_) => "add",
                    Applied::Remove(_) => "remove",
                    Applied::Edit { .. } => "edit",
                },
                handles.len()
            );
            for handle in &handles {
                handle.deliver(change)?;
            }
        }
        Ok(())
    }
}

impl TableState {
    /// Validates and applies one source change. Returns the primitive
    /// changes to fan out (two for a decomposed key-crossing edit).
    fn apply(&mut self, change: SourceChange) -> Result<Vec<Applied>> {
        match change {
            SourceChange::Add(row) => Ok(alloc::vec![self.apply_add(row)?]),
            SourceChange::Remove(row) => Ok(alloc::vec![self.apply_remove(row)?]),
            SourceChange::Edit { old, new } => {
                let old_key = self.schema.row_key(&old);
                let new_key = self.schema.row_key(&new);
                if old_key == new_key {
                    Ok(alloc::vec![self.apply_edit(old, new, old_key)?])
                } else {
                    // Validate both halves before touching anything.
                    self.check_remove(&old, &old_key)?;
                    self.schema.check_row(&new)?;
                    if self.rows.contains_key(&new_key) {
                        return Err(Error::duplicate_primary_key(
                            self.schema.name(),
                            new_key,
                        ));
                    }
                    let removed = self.apply_remove(old)?;
                    let added = self.apply_add(new)?;
                    Ok(alloc::vec![removed, added])
                }
            }
        }
    }

    fn apply_add(&mut self, row: Row) -> Result<Applied> {
        self.schema.check_row(&row)?;
        let key = self.schema.row_key(&row);
        if self.rows.contains_key(&key) {
            return Err(Error::duplicate_primary_key(self.schema.name(), key));
        }
        let row = Rc::new(row);
        for entry in &mut self.orderings {
            entry.index.insert(entry.sort.sort_key(&row), key.clone());
        }
        for (pos, index) in &self.hash_indices {
            index
                .borrow_mut()
                .add(row.get(*pos).cloned().unwrap_or(Value::Null), key.clone());
        }
        self.rows.insert(key, row.clone());
        Ok(Applied::Add(row))
    }

    /// Checks that `row` deep-equals the stored row under its key.
    fn check_remove(&self, row: &Row, key: &RowKey) -> Result<()> {
        match self.rows.get(key) {
            Some(stored) if stored.as_ref() == row => Ok(()),
            _ => Err(Error::not_found(self.schema.name(), key.clone())),
        }
    }

    fn apply_remove(&mut self, row: Row) -> Result<Applied> {
        let key = self.schema.row_key(&row);
        self.check_remove(&row, &key)?;
        let stored = self
            .rows
            .remove(&key)
            .expect("presence checked by check_remove");
        for entry in &mut self.orderings {
            entry.index.remove(&entry.sort.sort_key(&stored));
        }
        for (pos, index) in &self.hash_indices {
            index
                .borrow_mut()
                .remove(stored.get(*pos).unwrap_or(&Value::Null), &key);
        }
        Ok(Applied::Remove(stored))
    }

    fn apply_edit(&mut self, old: Row, new: Row, key: RowKey) -> Result<Applied> {
        self.check_remove(&old, &key)?;
        self.schema.check_row(&new)?;
        let old_rc = self
            .rows
            .get(&key)
            .expect("presence checked by check_remove")
            .clone();
        let new_rc = Rc::new(new);

        for entry in &mut self.orderings {
            let old_sort = entry.sort.sort_key(&old_rc);
            let new_sort = entry.sort.sort_key(&new_rc);
            if old_sort != new_sort {
                entry.index.remove(&old_sort);
                entry.index.insert(new_sort, key.clone());
            }
        }
        for (pos, index) in &self.hash_indices {
            let old_val = old_rc.get(*pos).unwrap_or(&Value::Null);
            let new_val = new_rc.get(*pos).unwrap_or(&Value::Null);
            if old_val != new_val {
                let mut index = index.borrow_mut();
                index.remove(old_val, &key);
                index.add(new_val.clone(), key.clone());
            }
        }
        self.rows.insert(key, new_rc.clone());
        Ok(Applied::Edit {
            old: old_rc,
            new: new_rc,
        })
    }
}

/// One connection to a table: an `Operator` producing the table's rows in
/// the connection's ordering.
pub struct SourceHandle {
    state: Rc<RefCell<TableState>>,
    live_cursors: Rc<Cell<usize>>,
    stream_live: Rc<Cell<bool>>,
    id: u64,
    ordering: usize,
    filters: Filters,
    applied_filters: bool,
    info: FlowInfo,
    output: OutputSlot,
    destroyed: Cell<bool>,
}

/// Keeps the source's outstanding-cursor count and the handle's
/// single-consumer flag accurate even when a stream is dropped
/// half-consumed.
struct CursorGuard {
    cursors: Rc<Cell<usize>>,
    stream_live: Rc<Cell<bool>>,
}

impl CursorGuard {
    fn new(cursors: Rc<Cell<usize>>, stream_live: Rc<Cell<bool>>) -> Self {
        cursors.set(cursors.get() + 1);
        stream_live.set(true);
        CursorGuard {
            cursors,
            stream_live,
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.cursors.set(self.cursors.get() - 1);
        self.stream_live.set(false);
    }
}

impl SourceHandle {
    /// True if the source applied this connection's push-down filters
    /// itself; downstream must not re-filter.
    pub fn applied_filters(&self) -> bool {
        self.applied_filters
    }

    /// Delivers one applied change through this connection, applying the
    /// connection's filter transition semantics.
    fn deliver(&self, change: &Applied) -> Result<()> {
        if self.destroyed.get() {
            return Ok(());
        }
        let derived = match change {
            Applied::Add(row) => {
                if self.filters.matches(row) {
                    Some(Change::Add(Node::leaf(row.clone())))
                } else {
                    None
                }
            }
            Applied::Remove(row) => {
                if self.filters.matches(row) {
                    Some(Change::Remove(Node::leaf(row.clone())))
                } else {
                    None
                }
            }
            Applied::Edit { old, new } => {
                match (self.filters.matches(old), self.filters.matches(new)) {
                    (true, true) => Some(Change::edit(old.clone(), new.clone())),
                    (false, true) => Some(Change::Add(Node::leaf(new.clone()))),
                    (true, false) => Some(Change::Remove(Node::leaf(old.clone()))),
                    (false, false) => None,
                }
            }
        };
        match derived {
            Some(change) => self.output.push(change),
            None => Ok(()),
        }
    }

    /// Ordered scan over the connection's index, filtered by the request.
    fn scan(&self, req: FetchRequest) -> NodeStream {
        let state = self.state.clone();
        let ordering = self.ordering;
        let filters = self.filters.clone();
        let guard = CursorGuard::new(self.live_cursors.clone(), self.stream_live.clone());
        let mut pos = {
            let state = state.borrow();
            state.orderings[ordering].index.lower_bound(req.lower.as_ref())
        };
        let constraint = req.constraint;

        NodeStream::new(move || {
            let _keep_alive = &guard;
            loop {
                let row = {
                    let state = state.borrow();
                    let entry = &state.orderings[ordering];
                    match entry.index.get(pos) {
                        None => return None,
                        Some((_, row_key)) => {
                            pos += 1;
                            state
                                .rows
                                .get(row_key)
                                .expect("ordered index entry without a row")
                                .clone()
                        }
                    }
                };
                let constrained_out = constraint
                    .as_ref()
                    .map(|c| !c.matches(&row))
                    .unwrap_or(false);
                if constrained_out || !filters.matches(&row) {
                    continue;
                }
                return Some(Ok(Node::leaf(row)));
            }
        })
    }

    /// Point lookup through a maintained hash index, re-sorted into the
    /// connection's ordering.
    fn hash_lookup(&self, req: &FetchRequest, index: &SharedHashIndex) -> NodeStream {
        let state = self.state.borrow();
        let entry = &state.orderings[self.ordering];
        let constraint = req
            .constraint
            .as_ref()
            .expect("hash lookup requires a constraint");

        let mut rows: Vec<Rc<Row>> = index
            .borrow()
            .get(&constraint.value)
            .iter()
            .filter_map(|key| state.rows.get(key).cloned())
            .filter(|row| self.filters.matches(row))
            .collect();
        let sort = entry.sort.clone();
        rows.sort_by(|a, b| compare_rows(&sort, a, b));

        if let Some(lower) = &req.lower {
            let comparator = entry.index.comparator().clone();
            let bound = lower.clone();
            rows.retain(|row| {
                let key = sort.sort_key(row);
                let ord = comparator.compare(&key, &bound.key);
                ord == core::cmp::Ordering::Greater
                    || (bound.inclusive && ord == core::cmp::Ordering::Equal)
            });
        }

        NodeStream::from_nodes(rows.into_iter().map(Node::leaf).collect())
    }

    fn produce(&self, req: FetchRequest) -> Result<NodeStream> {
        if self.destroyed.get() {
            return Err(Error::invariant("fetch on a destroyed connection"));
        }
        if self.stream_live.get() {
            return Err(Error::abandoned(
                "connection fetched again while a previous sequence is live",
            ));
        }
        if let Some(constraint) = &req.constraint {
            let state = self.state.borrow();
            let index = state
                .hash_indices
                .iter()
                .find(|(pos, _)| *pos == constraint.column)
                .map(|(_, idx)| idx.clone());
            drop(state);
            if let Some(index) = index {
                return Ok(self.hash_lookup(&req, &index));
            }
        }
        Ok(self.scan(req))
    }
}

impl Operator for SourceHandle {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        self.produce(req)
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        // A source holds no scratch; cleanup is an ordinary scan.
        self.produce(req)
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.output.clear();
        let mut state = self.state.borrow_mut();
        state.connections.retain(|c| c.id != self.id);
    }
}
